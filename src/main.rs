//! quadrect - rectify a four-corner region of an image
//!
//! Loads an image, takes four corner points (from the command line or the
//! config file), rectifies the quad and writes the full rectified image.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use quadrect::config::Config;
use quadrect::overlay::{draw_overlay, OverlayStyle};
use quadrect::{ImagePoint, RectificationSession};

/// quadrect - perspective rectification from four corner points
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input image
    input: PathBuf,

    /// Where to write the rectified image
    #[arg(short, long)]
    output: PathBuf,

    /// Corner point as X,Y in image pixels (give exactly four, any order)
    #[arg(short = 'p', long = "corner", value_parser = parse_point)]
    corners: Vec<ImagePoint>,

    /// Distortion marker as X,Y in image pixels; snapped to the nearest grid node
    #[arg(short = 'd', long = "distortion", value_parser = parse_point)]
    distortions: Vec<ImagePoint>,

    /// Grid rows (overrides config)
    #[arg(long)]
    rows: Option<usize>,

    /// Grid columns (overrides config)
    #[arg(long)]
    cols: Option<usize>,

    /// Also write the source image with the grid, corners and markers drawn on it
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Print the transform and transformed points as JSON
    #[arg(long)]
    json: bool,

    /// Configuration file path (created with defaults if missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging (RUST_LOG takes precedence when set)
    #[arg(short, long)]
    verbose: bool,
}

fn parse_point(s: &str) -> std::result::Result<ImagePoint, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {:?}", s))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad X in {:?}: {}", s, e))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad Y in {:?}: {}", s, e))?;
    if !(x.is_finite() && y.is_finite()) {
        return Err(format!("non-finite point {:?}", s));
    }
    Ok(ImagePoint::new(x, y))
}

/// Log filter from `RUST_LOG`, falling back to info (debug when verbose)
fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback_filter(verbose))
}

fn fallback_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { "debug" } else { "info" })
}

fn main() -> Result<()> {
    let args = Args::parse();

    FmtSubscriber::builder()
        .with_env_filter(log_filter(args.verbose))
        .with_target(false)
        .compact()
        .init();

    info!("quadrect v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => Config::load_or_create(path)?,
        None => Config::default(),
    };
    if let Some(rows) = args.rows {
        config.grid.rows = rows;
    }
    if let Some(cols) = args.cols {
        config.grid.cols = cols;
    }
    config.validate()?;

    let corners = if args.corners.is_empty() {
        config.corners.clone()
    } else {
        args.corners.clone()
    };
    if corners.len() != 4 {
        bail!("exactly four corners are required, got {}", corners.len());
    }

    let image = image::open(&args.input)
        .with_context(|| format!("Failed to load image {:?}", args.input))?
        .to_rgb8();
    info!("Loaded {:?} ({}x{})", args.input, image.width(), image.height());

    let mut session = RectificationSession::new(&config)?;
    session.load_image(image);
    session.set_corners(&corners)?;
    for point in &args.distortions {
        session.add_distortion(*point)?;
    }

    if let Some(path) = &args.overlay {
        let frame = session.frame()?;
        let overlay = draw_overlay(&frame, &OverlayStyle::default());
        overlay
            .save(path)
            .with_context(|| format!("Failed to write overlay {:?}", path))?;
        info!("Wrote overlay to {:?}", path);
    }

    session.begin_preview().context("Rectification failed")?;
    let rect = *session
        .rectification()
        .context("Rectification missing after preview")?;
    let frame = session.frame()?;

    frame
        .image
        .save(&args.output)
        .with_context(|| format!("Failed to write {:?}", args.output))?;
    let out = rect.output_size();
    info!("Wrote {}x{} rectified image to {:?}", out.width, out.height, args.output);

    if args.json {
        let (target_w, target_h) = rect.target_size();
        let report = json!({
            "target": { "width": target_w, "height": target_h },
            "output": { "width": out.width, "height": out.height },
            "offset": [rect.offset().0, rect.offset().1],
            "transform": rect.transform().to_row_major(),
            "corners": frame.corners,
            "grid": frame.grid,
            "distortions": frame.distortions,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("10,20.5").unwrap(), ImagePoint::new(10.0, 20.5));
        assert_eq!(parse_point(" -3 , 4 ").unwrap(), ImagePoint::new(-3.0, 4.0));
        assert!(parse_point("10").is_err());
        assert!(parse_point("a,b").is_err());
        assert!(parse_point("inf,1").is_err());
    }

    #[test]
    fn test_fallback_log_level() {
        assert_eq!(fallback_filter(true).to_string(), "debug");
        assert_eq!(fallback_filter(false).to_string(), "info");
    }

    #[test]
    fn test_args_parse_distortions() {
        let args = Args::try_parse_from(["quadrect", "in.png", "-o", "out.png", "-d", "5,6", "--distortion", "7,8"]).unwrap();
        assert_eq!(args.distortions, vec![ImagePoint::new(5.0, 6.0), ImagePoint::new(7.0, 8.0)]);
        assert!(args.corners.is_empty());
    }

    #[test]
    fn test_args_parse_corners() {
        let args = Args::try_parse_from([
            "quadrect", "in.png", "-o", "out.png", "-p", "0,0", "-p", "10,0", "--corner", "10,10", "-p", "0,10",
        ])
        .unwrap();
        assert_eq!(args.corners.len(), 4);
        assert_eq!(args.corners[2], ImagePoint::new(10.0, 10.0));
        assert!(args.distortions.is_empty());
        assert!(!args.json);
    }
}
