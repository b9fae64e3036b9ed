//! Points and sizes in the two coordinate spaces
//!
//! Image space is the fixed pixel grid of the loaded raster (origin top-left).
//! Viewport space is the on-screen display area, subject to pan and zoom.
//! The two point types are distinct so a conversion through
//! [`ViewTransform`](crate::view::ViewTransform) is always explicit.

use serde::{Deserialize, Serialize};

/// A point in image pixel coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ImagePoint {
    pub x: f64,
    pub y: f64,
}

impl ImagePoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another image point
    pub fn distance(&self, other: &ImagePoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A point in viewport (widget) coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ViewportPoint {
    pub x: f64,
    pub y: f64,
}

impl ViewportPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Manhattan distance, used for click hit-testing
    pub fn manhattan(&self, other: &ViewportPoint) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Raster dimensions in pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The four raster corners, clockwise from the origin
    pub fn corners(&self) -> [ImagePoint; 4] {
        let w = self.width as f64;
        let h = self.height as f64;
        [
            ImagePoint::new(0.0, 0.0),
            ImagePoint::new(w, 0.0),
            ImagePoint::new(w, h),
            ImagePoint::new(0.0, h),
        ]
    }
}

/// Viewport dimensions; fractional because widget geometry may be scaled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}
