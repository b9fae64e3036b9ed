//! Grid, corner and distortion marker overlay rendering
//!
//! Draws the preview lattice, the corner crosshairs and the distortion
//! markers straight onto an RGB raster in image space, for exporting what the
//! interactive view shows.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::geometry::ImagePoint;
use crate::session::FrameView;

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub grid_color: Rgb<u8>,
    pub corner_color: Rgb<u8>,
    pub distortion_color: Rgb<u8>,
    /// Dash and gap length for grid lines, in pixels; `None` draws solid lines
    pub dash: Option<(f32, f32)>,
    pub node_radius: i32,
    /// Half-length of each crosshair arm
    pub crosshair: f32,
    pub distortion_radius: i32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            grid_color: Rgb([255, 255, 0]),
            corner_color: Rgb([255, 255, 0]),
            distortion_color: Rgb([0, 0, 255]),
            dash: Some((6.0, 4.0)),
            node_radius: 3,
            crosshair: 15.0,
            distortion_radius: 10,
        }
    }
}

fn to_f32(p: ImagePoint) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

fn to_i32(p: ImagePoint) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

fn draw_dashed(canvas: &mut RgbImage, a: ImagePoint, b: ImagePoint, dash: Option<(f32, f32)>, color: Rgb<u8>) {
    let Some((on, off)) = dash.filter(|(on, off)| *on > 0.0 && *off >= 0.0) else {
        draw_line_segment_mut(canvas, to_f32(a), to_f32(b), color);
        return;
    };

    let length = a.distance(&b) as f32;
    if length == 0.0 || !length.is_finite() {
        return;
    }
    let (dx, dy) = (((b.x - a.x) as f32) / length, ((b.y - a.y) as f32) / length);
    let (ax, ay) = to_f32(a);

    let mut t = 0.0f32;
    while t < length {
        let end = (t + on).min(length);
        draw_line_segment_mut(canvas, (ax + dx * t, ay + dy * t), (ax + dx * end, ay + dy * end), color);
        t = end + off;
    }
}

/// Render the frame's grid, corners and distortion markers onto a copy of its image
pub fn draw_overlay(frame: &FrameView<'_>, style: &OverlayStyle) -> RgbImage {
    let mut canvas = frame.image.clone();

    if let Some(grid) = frame.grid {
        for (a, b) in grid.segments() {
            draw_dashed(&mut canvas, a, b, style.dash, style.grid_color);
        }
        for node in grid.points() {
            draw_filled_circle_mut(&mut canvas, to_i32(*node), style.node_radius, style.grid_color);
        }
    }

    for marker in frame.distortions {
        let (x, y) = to_i32(marker.point);
        for r in [style.distortion_radius, style.distortion_radius - 1] {
            draw_hollow_circle_mut(&mut canvas, (x, y), r.max(0), style.distortion_color);
        }
    }

    for corner in frame.corners {
        let (x, y) = to_f32(*corner);
        let arm = style.crosshair;
        draw_line_segment_mut(&mut canvas, (x - arm, y), (x + arm, y), style.corner_color);
        draw_line_segment_mut(&mut canvas, (x, y - arm), (x, y + arm), style.corner_color);
        draw_hollow_circle_mut(&mut canvas, to_i32(*corner), 2, style.corner_color);
    }

    canvas
}
