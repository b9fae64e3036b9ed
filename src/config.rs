//! Configuration management for quadrect

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geometry::ImagePoint;

/// Grid overlay dimensions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { rows: 4, cols: 4 }
    }
}

/// Pan/zoom behaviour of the image display
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ViewConfig {
    /// Multiplier applied per wheel step
    pub zoom_step: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Manhattan distance (viewport px) within which a click grabs a corner
    pub hit_radius: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_step: 1.1,
            min_scale: 0.1,
            max_scale: 10.0,
            hit_radius: 10.0,
        }
    }
}

/// Rectified output settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputConfig {
    /// Largest raster area (width * height) the warp may allocate
    pub max_pixels: u64,
    /// Colour for output pixels that fall outside the source image
    pub fill: [u8; 3],
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_pixels: 16384 * 16384,
            fill: [0, 0, 0],
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Preset corner points in image space
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corners: Vec<ImagePoint>,
}

impl Config {
    /// Load configuration from a file, or create default if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            config
                .validate()
                .with_context(|| format!("Invalid config in {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            tracing::info!("Created default configuration at {:?}", path);
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory {:?}", parent))?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Reject values the core would refuse at run time anyway
    pub fn validate(&self) -> Result<()> {
        if self.grid.rows < 2 || self.grid.cols < 2 {
            bail!(
                "grid must be at least 2x2, got {}x{}",
                self.grid.rows,
                self.grid.cols
            );
        }
        let v = &self.view;
        if !(v.min_scale > 0.0 && v.min_scale <= v.max_scale && v.max_scale.is_finite()) {
            bail!("invalid zoom range [{}, {}]", v.min_scale, v.max_scale);
        }
        if !(v.zoom_step > 1.0 && v.zoom_step.is_finite()) {
            bail!("zoom_step must be > 1.0, got {}", v.zoom_step);
        }
        if !self.corners.is_empty() && self.corners.len() != 4 {
            bail!("expected 0 or 4 preset corners, got {}", self.corners.len());
        }
        if self.output.max_pixels == 0 {
            bail!("output.max_pixels must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.grid, GridConfig { rows: 4, cols: 4 });
        assert_eq!(config.view.zoom_step, 1.1);
        assert!(config.corners.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[grid]\nrows = 6\ncols = 3\n").unwrap();
        assert_eq!(config.grid.rows, 6);
        assert_eq!(config.grid.cols, 3);
        assert_eq!(config.view, ViewConfig::default());
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_validate_rejects_small_grid() {
        let mut config = Config::default();
        config.grid.rows = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_three_corners() {
        let mut config = Config::default();
        config.corners = vec![ImagePoint::new(0.0, 0.0); 3];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_create_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quadrect.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, Config::default());

        let mut edited = created.clone();
        edited.grid.rows = 8;
        edited.corners = vec![
            ImagePoint::new(10.0, 10.0),
            ImagePoint::new(110.0, 10.0),
            ImagePoint::new(110.0, 110.0),
            ImagePoint::new(10.0, 110.0),
        ];
        edited.save(&path).unwrap();

        let loaded = Config::load_or_create(&path).unwrap();
        assert_eq!(loaded, edited);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[grid]\nrows = 1\ncols = 4\n").unwrap();
        assert!(Config::load_or_create(&path).is_err());
    }
}
