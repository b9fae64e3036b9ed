//! Distortion markers paired with grid nodes
//!
//! Each marker is a clicked image point together with the grid node nearest
//! to it at the time of the click. Markers are removed by right-clicking
//! within the hit radius, the same rule the corner set uses.

use serde::Serialize;

use crate::error::{RectifyError, Result};
use crate::geometry::{ImagePoint, ViewportPoint};
use crate::grid::Grid;
use crate::view::ViewTransform;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistortionPoint {
    pub point: ImagePoint,
    /// Nearest grid node when the point was placed
    pub grid_point: ImagePoint,
    pub row: usize,
    pub col: usize,
}

impl DistortionPoint {
    fn map<F: Fn(ImagePoint) -> ImagePoint>(&self, f: &F) -> Self {
        Self {
            point: f(self.point),
            grid_point: f(self.grid_point),
            ..*self
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistortionSet {
    points: Vec<DistortionPoint>,
}

impl DistortionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[DistortionPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Place a marker at `point`, snapped to its nearest node of `grid`
    pub fn add(&mut self, point: ImagePoint, grid: Option<&Grid>) -> Result<DistortionPoint> {
        let (row, col, grid_point) = grid.and_then(|g| g.nearest(point)).ok_or(RectifyError::NoGrid)?;
        let marker = DistortionPoint {
            point,
            grid_point,
            row,
            col,
        };
        self.points.push(marker);
        Ok(marker)
    }

    /// Index of the first marker within `radius` (Manhattan, viewport px) of `cursor`
    pub fn hit_test(&self, view: &ViewTransform, cursor: ViewportPoint, radius: f64) -> Option<usize> {
        self.points
            .iter()
            .position(|m| view.to_viewport(m.point).manhattan(&cursor) < radius)
    }

    /// Remove the marker under the cursor, if any
    pub fn remove_at(&mut self, view: &ViewTransform, cursor: ViewportPoint, radius: f64) -> Option<DistortionPoint> {
        self.hit_test(view, cursor, radius).map(|i| self.points.remove(i))
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Apply `f` to every marker and its grid node
    pub fn map<F: Fn(ImagePoint) -> ImagePoint>(&self, f: F) -> Self {
        Self {
            points: self.points.iter().map(|m| m.map(&f)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewConfig;
    use crate::geometry::{ImageSize, ViewportSize};
    use crate::grid::generate_grid;

    fn grid() -> Grid {
        let corners = [
            ImagePoint::new(0.0, 0.0),
            ImagePoint::new(90.0, 0.0),
            ImagePoint::new(90.0, 90.0),
            ImagePoint::new(0.0, 90.0),
        ];
        // Nodes every 30 px
        generate_grid(&corners, 4, 4).unwrap()
    }

    #[test]
    fn test_add_snaps_to_nearest_node() {
        let grid = grid();
        let mut set = DistortionSet::new();
        let marker = set.add(ImagePoint::new(34.0, 58.0), Some(&grid)).unwrap();
        assert_eq!(marker.grid_point, ImagePoint::new(30.0, 60.0));
        assert_eq!((marker.row, marker.col), (2, 1));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_add_without_grid_fails() {
        let mut set = DistortionSet::new();
        assert_eq!(set.add(ImagePoint::new(1.0, 1.0), None), Err(RectifyError::NoGrid));
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_at_cursor_and_clear() {
        let grid = grid();
        let mut view = ViewTransform::new(ViewportSize::new(100.0, 100.0), ViewConfig::default());
        view.set_image(ImageSize::new(100, 100));

        let mut set = DistortionSet::new();
        set.add(ImagePoint::new(10.0, 10.0), Some(&grid)).unwrap();
        set.add(ImagePoint::new(70.0, 40.0), Some(&grid)).unwrap();

        assert_eq!(set.remove_at(&view, ViewportPoint::new(50.0, 50.0), 10.0), None);
        let removed = set.remove_at(&view, ViewportPoint::new(73.0, 44.0), 10.0).unwrap();
        assert_eq!(removed.point, ImagePoint::new(70.0, 40.0));
        assert_eq!(set.len(), 1);

        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_map_moves_point_and_node() {
        let grid = grid();
        let mut set = DistortionSet::new();
        set.add(ImagePoint::new(31.0, 29.0), Some(&grid)).unwrap();

        let moved = set.map(|p| ImagePoint::new(p.x + 5.0, p.y * 2.0));
        let m = moved.points()[0];
        assert_eq!(m.point, ImagePoint::new(36.0, 58.0));
        assert_eq!(m.grid_point, ImagePoint::new(35.0, 60.0));
        assert_eq!((m.row, m.col), (1, 1));
    }
}
