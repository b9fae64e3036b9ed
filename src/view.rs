//! Viewport <-> image coordinate mapping under pan and zoom
//!
//! The scaled image is centred in the viewport and then shifted by the pan
//! offset:
//!
//! ```text
//! origin     = (viewport - image * scale) / 2 + pan
//! to_image   = (p - origin) / scale
//! to_viewport = p * scale + origin
//! ```
//!
//! With no image loaded both mappings are the identity and pan/zoom are no-ops.

use tracing::debug;

use crate::config::ViewConfig;
use crate::geometry::{ImagePoint, ImageSize, ViewportPoint, ViewportSize};

/// Scale factor and pan offset of the displayed image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub scale: f64,
    /// Pan offset in viewport pixels
    pub pan: (f64, f64),
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan: (0.0, 0.0),
        }
    }
}

/// Wheel direction for a single zoom step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zoom {
    In,
    Out,
}

impl Zoom {
    /// Map a wheel delta to a zoom direction; zero is no zoom
    pub fn from_wheel_delta(delta: f64) -> Option<Self> {
        if delta > 0.0 {
            Some(Zoom::In)
        } else if delta < 0.0 {
            Some(Zoom::Out)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewTransform {
    state: ViewState,
    viewport: ViewportSize,
    image: Option<ImageSize>,
    settings: ViewConfig,
}

impl ViewTransform {
    pub fn new(viewport: ViewportSize, settings: ViewConfig) -> Self {
        Self {
            state: ViewState::default(),
            viewport,
            image: None,
            settings,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image
    }

    pub fn settings(&self) -> &ViewConfig {
        &self.settings
    }

    /// Attach a freshly loaded image; resets zoom and pan
    pub fn set_image(&mut self, size: ImageSize) {
        self.image = Some(size);
        self.state = ViewState::default();
    }

    pub fn clear_image(&mut self) {
        self.image = None;
        self.state = ViewState::default();
    }

    pub fn set_viewport_size(&mut self, viewport: ViewportSize) {
        self.viewport = viewport;
    }

    /// Top-left of the scaled image in viewport coordinates
    fn image_origin(&self, image: ImageSize) -> (f64, f64) {
        let scaled_w = image.width as f64 * self.state.scale;
        let scaled_h = image.height as f64 * self.state.scale;
        (
            (self.viewport.width - scaled_w) / 2.0 + self.state.pan.0,
            (self.viewport.height - scaled_h) / 2.0 + self.state.pan.1,
        )
    }

    pub fn to_image(&self, p: ViewportPoint) -> ImagePoint {
        match self.image {
            Some(image) => {
                let (ox, oy) = self.image_origin(image);
                ImagePoint::new((p.x - ox) / self.state.scale, (p.y - oy) / self.state.scale)
            }
            None => ImagePoint::new(p.x, p.y),
        }
    }

    pub fn to_viewport(&self, p: ImagePoint) -> ViewportPoint {
        match self.image {
            Some(image) => {
                let (ox, oy) = self.image_origin(image);
                ViewportPoint::new(p.x * self.state.scale + ox, p.y * self.state.scale + oy)
            }
            None => ViewportPoint::new(p.x, p.y),
        }
    }

    /// One wheel step around `cursor`.
    ///
    /// The image point under the cursor stays under the cursor. Returns
    /// `false` when nothing changed (no image, or already at the limit).
    pub fn zoom_at(&mut self, cursor: ViewportPoint, zoom: Zoom) -> bool {
        let Some(image) = self.image else {
            return false;
        };

        let anchor = self.to_image(cursor);
        let step = self.settings.zoom_step;
        let target = match zoom {
            Zoom::In => self.state.scale * step,
            Zoom::Out => self.state.scale / step,
        };
        let scale = target.clamp(self.settings.min_scale, self.settings.max_scale);
        if scale == self.state.scale {
            return false;
        }
        self.state.scale = scale;

        // Solve pan so that to_viewport(anchor) == cursor under the new scale
        let centre_x = (self.viewport.width - image.width as f64 * scale) / 2.0;
        let centre_y = (self.viewport.height - image.height as f64 * scale) / 2.0;
        self.state.pan = (
            cursor.x - anchor.x * scale - centre_x,
            cursor.y - anchor.y * scale - centre_y,
        );

        debug!("Zoom {:?} -> scale {:.4}", zoom, scale);
        true
    }

    /// Shift the image by a drag delta in viewport pixels
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        if self.image.is_none() {
            return;
        }
        self.state.pan.0 += dx;
        self.state.pan.1 += dy;
    }

    /// Scale the image to fit the viewport, preserving aspect ratio
    pub fn fit_to_view(&mut self) {
        let Some(image) = self.image else {
            return;
        };
        if image.width == 0 || image.height == 0 {
            return;
        }
        let scale = (self.viewport.width / image.width as f64)
            .min(self.viewport.height / image.height as f64);
        self.state.scale = scale.clamp(self.settings.min_scale, self.settings.max_scale);
        self.state.pan = (0.0, 0.0);
        debug!("Fit to view -> scale {:.4}", self.state.scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    fn view_with_image() -> ViewTransform {
        let mut view = ViewTransform::new(ViewportSize::new(800.0, 600.0), ViewConfig::default());
        view.set_image(ImageSize::new(640, 480));
        view
    }

    fn close(a: ViewportPoint, b: ViewportPoint) -> bool {
        (a.x - b.x).abs() < TOL && (a.y - b.y).abs() < TOL
    }

    #[test]
    fn test_centered_origin() {
        let view = view_with_image();
        // (800 - 640) / 2, (600 - 480) / 2
        let p = view.to_viewport(ImagePoint::new(0.0, 0.0));
        assert_eq!(p, ViewportPoint::new(80.0, 60.0));
        let q = view.to_image(ViewportPoint::new(80.0, 60.0));
        assert_eq!(q, ImagePoint::new(0.0, 0.0));
    }

    #[test]
    fn test_round_trip_under_pan_and_zoom() {
        let mut view = view_with_image();
        let cursors = [
            ViewportPoint::new(0.0, 0.0),
            ViewportPoint::new(400.0, 300.0),
            ViewportPoint::new(799.5, 12.25),
        ];
        for step in 0..12 {
            let zoom = if step % 3 == 0 { Zoom::Out } else { Zoom::In };
            view.zoom_at(cursors[step % 3], zoom);
            view.pan_by(13.7, -4.2);
            for p in [
                ViewportPoint::new(-50.0, 20.0),
                ViewportPoint::new(333.3, 444.4),
                ViewportPoint::new(1e4, -1e4),
            ] {
                let back = view.to_viewport(view.to_image(p));
                assert!(close(back, p), "{:?} -> {:?}", p, back);
            }
        }
    }

    #[test]
    fn test_zoom_keeps_anchor_under_cursor() {
        let mut view = view_with_image();
        view.pan_by(-37.0, 21.0);
        let cursor = ViewportPoint::new(250.0, 175.0);
        for zoom in [Zoom::In, Zoom::In, Zoom::Out, Zoom::In, Zoom::Out, Zoom::Out] {
            let anchor = view.to_image(cursor);
            assert!(view.zoom_at(cursor, zoom));
            assert!(close(view.to_viewport(anchor), cursor));
        }
    }

    #[test]
    fn test_zoom_step_and_clamp() {
        let mut view = view_with_image();
        let cursor = ViewportPoint::new(400.0, 300.0);
        view.zoom_at(cursor, Zoom::In);
        assert!((view.state().scale - 1.1).abs() < 1e-12);
        view.zoom_at(cursor, Zoom::Out);
        assert!((view.state().scale - 1.0).abs() < 1e-12);

        for _ in 0..100 {
            view.zoom_at(cursor, Zoom::In);
        }
        assert_eq!(view.state().scale, 10.0);
        assert!(!view.zoom_at(cursor, Zoom::In));

        for _ in 0..200 {
            view.zoom_at(cursor, Zoom::Out);
        }
        assert_eq!(view.state().scale, 0.1);
    }

    #[test]
    fn test_no_image_is_identity_and_noop() {
        let mut view = ViewTransform::new(ViewportSize::new(800.0, 600.0), ViewConfig::default());
        let p = ViewportPoint::new(12.0, 34.0);
        assert_eq!(view.to_image(p), ImagePoint::new(12.0, 34.0));
        assert!(!view.zoom_at(p, Zoom::In));
        view.pan_by(10.0, 10.0);
        view.fit_to_view();
        assert_eq!(view.state(), ViewState::default());
    }

    #[test]
    fn test_fit_to_view() {
        let mut view = view_with_image();
        view.set_viewport_size(ViewportSize::new(320.0, 480.0));
        view.pan_by(5.0, 5.0);
        view.fit_to_view();
        assert_eq!(view.state().scale, 0.5);
        assert_eq!(view.state().pan, (0.0, 0.0));
    }

    #[test]
    fn test_set_image_resets_state() {
        let mut view = view_with_image();
        view.zoom_at(ViewportPoint::new(10.0, 10.0), Zoom::In);
        view.set_image(ImageSize::new(100, 100));
        assert_eq!(view.state(), ViewState::default());
    }

    #[test]
    fn test_wheel_delta() {
        assert_eq!(Zoom::from_wheel_delta(120.0), Some(Zoom::In));
        assert_eq!(Zoom::from_wheel_delta(-120.0), Some(Zoom::Out));
        assert_eq!(Zoom::from_wheel_delta(0.0), None);
    }
}
