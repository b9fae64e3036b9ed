//! Rectification preview session
//!
//! Owns the working image, the corner set and the grid, and toggles between
//! the normal view and a rectified preview. Entering the preview stores a
//! snapshot of everything it replaces; leaving it puts the snapshot back
//! verbatim.

use std::fmt;
use std::sync::Arc;

use image::RgbImage;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{Config, OutputConfig};
use crate::corners::{CornerEvent, CornerObserver, CornerSet};
use crate::distortion::{DistortionPoint, DistortionSet};
use crate::error::{RectifyError, Result};
use crate::geometry::{ImagePoint, ImageSize, ViewportPoint};
use crate::grid::{Grid, GridGenerator};
use crate::ordering::order_corners;
use crate::transform::{compute_rectification, warp_image, Rectification};
use crate::view::ViewTransform;

/// A session guarded for use from more than one thread
pub type SharedSession = Arc<Mutex<RectificationSession>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Normal,
    Previewing,
}

/// Borrowed view of the live image and point sets
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub image: &'a RgbImage,
    pub corners: &'a [ImagePoint],
    pub grid: Option<&'a Grid>,
    pub distortions: &'a [DistortionPoint],
}

/// Everything the preview replaces, captured on entry
#[derive(Debug, Clone)]
struct Snapshot {
    image: RgbImage,
    corners: CornerSet,
    grid: GridGenerator,
    distortions: DistortionSet,
    rectification: Rectification,
}

pub struct RectificationSession {
    image: Option<RgbImage>,
    corners: CornerSet,
    grid: GridGenerator,
    distortions: DistortionSet,
    output: OutputConfig,
    snapshot: Option<Snapshot>,
    observers: Vec<Box<dyn CornerObserver + Send>>,
}

impl fmt::Debug for RectificationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RectificationSession")
            .field("image", &self.image.as_ref().map(|i| i.dimensions()))
            .field("corners", &self.corners)
            .field("grid", &self.grid.size())
            .field("distortions", &self.distortions.len())
            .field("state", &self.state())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl RectificationSession {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            image: None,
            corners: CornerSet::new(),
            grid: GridGenerator::new(config.grid.rows, config.grid.cols)?,
            distortions: DistortionSet::new(),
            output: config.output,
            snapshot: None,
            observers: Vec::new(),
        })
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> SessionState {
        if self.snapshot.is_some() {
            SessionState::Previewing
        } else {
            SessionState::Normal
        }
    }

    pub fn is_previewing(&self) -> bool {
        self.snapshot.is_some()
    }

    /// The displayed image (rectified while previewing)
    pub fn image(&self) -> Option<&RgbImage> {
        self.image.as_ref()
    }

    /// The image as loaded, regardless of preview state
    pub fn original_image(&self) -> Option<&RgbImage> {
        match &self.snapshot {
            Some(snapshot) => Some(&snapshot.image),
            None => self.image.as_ref(),
        }
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image.as_ref().map(|i| ImageSize::new(i.width(), i.height()))
    }

    /// Corner points in insertion order
    pub fn corners(&self) -> &[ImagePoint] {
        self.corners.points()
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.grid()
    }

    /// Distortion markers in placement order
    pub fn distortions(&self) -> &[DistortionPoint] {
        self.distortions.points()
    }

    pub fn grid_size(&self) -> (usize, usize) {
        self.grid.size()
    }

    /// The active rectification, if previewing
    pub fn rectification(&self) -> Option<&Rectification> {
        self.snapshot.as_ref().map(|s| &s.rectification)
    }

    pub fn frame(&self) -> Result<FrameView<'_>> {
        let image = self.image.as_ref().ok_or(RectifyError::NoImageLoaded)?;
        Ok(FrameView {
            image,
            corners: self.corners.points(),
            grid: self.grid.grid(),
            distortions: self.distortions.points(),
        })
    }

    /// Register an observer for corner edits
    pub fn subscribe(&mut self, observer: Box<dyn CornerObserver + Send>) {
        self.observers.push(observer);
    }

    /// Replace the image. An active preview is ended first; corners, grid,
    /// distortion markers and any snapshot are dropped.
    pub fn load_image(&mut self, image: RgbImage) {
        if self.is_previewing() {
            warn!("Image reloaded during preview, restoring before reset");
            if let Err(e) = self.end_preview() {
                warn!("Failed to end preview on reload: {}", e);
            }
        }
        self.snapshot = None;
        self.distortions.clear();
        let event = self.corners.clear();
        self.notify(&event);
        info!("Image loaded: {}x{}", image.width(), image.height());
        self.image = Some(image);
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.is_previewing() {
            warn!("Edit rejected while rectification preview is active");
            return Err(RectifyError::InvalidState("corners are locked while previewing"));
        }
        Ok(())
    }

    /// Forward an edit to the grid and observers, in canonical order once complete
    fn notify(&mut self, event: &CornerEvent) {
        let points = self.corners.points();
        let ordered = order_corners(points).ok();
        let canonical: &[ImagePoint] = match &ordered {
            Some(quad) => &quad[..],
            None => points,
        };
        self.grid.corners_changed(event, canonical);
        for observer in &mut self.observers {
            observer.corners_changed(event, canonical);
        }
        debug!("Corner event {:?}, {} corners", event, points.len());
    }

    fn apply_edit(&mut self, edit: impl FnOnce(&mut CornerSet) -> Result<CornerEvent>) -> Result<CornerEvent> {
        self.ensure_editable()?;
        let event = edit(&mut self.corners)?;
        self.notify(&event);
        Ok(event)
    }

    pub fn add_corner(&mut self, point: ImagePoint) -> Result<CornerEvent> {
        self.apply_edit(|c| c.add(point))
    }

    pub fn move_corner(&mut self, index: usize, point: ImagePoint) -> Result<CornerEvent> {
        self.apply_edit(|c| c.move_to(index, point))
    }

    pub fn remove_corner(&mut self, index: usize) -> Result<CornerEvent> {
        self.apply_edit(|c| c.remove(index))
    }

    pub fn clear_corners(&mut self) -> Result<CornerEvent> {
        self.apply_edit(|c| Ok(c.clear()))
    }

    /// Replace all corners at once (e.g. from a saved preset)
    pub fn set_corners(&mut self, points: &[ImagePoint]) -> Result<CornerEvent> {
        self.apply_edit(|c| c.replace(points))
    }

    /// Index of the corner under the cursor, if any
    pub fn corner_at(&self, view: &ViewTransform, cursor: ViewportPoint) -> Option<usize> {
        self.corners.hit_test(view, cursor, view.settings().hit_radius)
    }

    /// Remove the corner under the cursor (right-click)
    pub fn remove_corner_at(&mut self, view: &ViewTransform, cursor: ViewportPoint) -> Result<Option<CornerEvent>> {
        self.ensure_editable()?;
        match self.corner_at(view, cursor) {
            Some(index) => self.remove_corner(index).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_grid_size(&mut self, rows: usize, cols: usize) -> Result<()> {
        self.ensure_editable()?;
        self.grid.set_grid_size(rows, cols)
    }

    /// Place a distortion marker paired with the nearest grid node (left-click)
    pub fn add_distortion(&mut self, point: ImagePoint) -> Result<DistortionPoint> {
        self.ensure_editable()?;
        let marker = self.distortions.add(point, self.grid.grid())?;
        debug!("Distortion marker at {:?} -> node ({}, {})", point, marker.row, marker.col);
        Ok(marker)
    }

    /// Remove the distortion marker under the cursor (right-click)
    pub fn remove_distortion_at(&mut self, view: &ViewTransform, cursor: ViewportPoint) -> Result<Option<DistortionPoint>> {
        self.ensure_editable()?;
        Ok(self.distortions.remove_at(view, cursor, view.settings().hit_radius))
    }

    pub fn clear_distortions(&mut self) -> Result<()> {
        self.ensure_editable()?;
        self.distortions.clear();
        Ok(())
    }

    /// Switch to the rectified preview.
    ///
    /// Fails without touching any state when no image is loaded, the corner
    /// set is incomplete, the quad is degenerate, or a preview is already active.
    pub fn begin_preview(&mut self) -> Result<FrameView<'_>> {
        if self.is_previewing() {
            warn!("Preview already active");
            return Err(RectifyError::InvalidState("preview already active"));
        }
        let image = self.image.as_ref().ok_or(RectifyError::NoImageLoaded)?;
        let quad = self.corners.quad()?;
        let ordered = order_corners(&quad)?;
        let size = ImageSize::new(image.width(), image.height());

        let rectification = compute_rectification(&ordered, size)?;
        let warped = warp_image(image, &rectification, &self.output)?;

        let transformed: Vec<ImagePoint> = self.corners.points().iter().map(|&p| rectification.apply(p)).collect();
        let transformed_ordered: Vec<ImagePoint> = ordered.iter().map(|&p| rectification.apply(p)).collect();
        let mut grid = self.grid.clone();
        grid.restore(
            &transformed_ordered,
            self.grid.grid().map(|g| g.map(|p| rectification.apply(p))),
        );
        let corners = CornerSet::from_points(&transformed)?;
        let distortions = self.distortions.map(|p| rectification.apply(p));

        let previous_image = self.image.replace(warped).ok_or(RectifyError::NoImageLoaded)?;
        self.snapshot = Some(Snapshot {
            image: previous_image,
            corners: std::mem::replace(&mut self.corners, corners),
            grid: std::mem::replace(&mut self.grid, grid),
            distortions: std::mem::replace(&mut self.distortions, distortions),
            rectification,
        });

        let out = rectification.output_size();
        info!("Rectification preview enabled ({}x{})", out.width, out.height);
        self.frame()
    }

    /// Leave the preview, restoring image, corners, grid and distortion markers
    pub fn end_preview(&mut self) -> Result<FrameView<'_>> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or(RectifyError::InvalidState("no preview to end"))?;
        self.image = Some(snapshot.image);
        self.corners = snapshot.corners;
        self.grid = snapshot.grid;
        self.distortions = snapshot.distortions;
        info!("Rectification preview disabled");
        self.frame()
    }
}
