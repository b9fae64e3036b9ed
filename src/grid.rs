//! Bilinear interpolation grid spanning four corner points

use serde::Serialize;
use tracing::debug;

use crate::corners::{CornerEvent, CornerObserver};
use crate::error::{RectifyError, Result};
use crate::geometry::ImagePoint;

/// Row-major `rows x cols` lattice of image-space points
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    points: Vec<ImagePoint>,
}

impl Grid {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn points(&self) -> &[ImagePoint] {
        &self.points
    }

    pub fn get(&self, row: usize, col: usize) -> Option<ImagePoint> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.points.get(row * self.cols + col).copied()
    }

    /// Apply `f` to every node, keeping the lattice shape
    pub fn map<F>(&self, f: F) -> Grid
    where
        F: Fn(ImagePoint) -> ImagePoint,
    {
        Grid {
            rows: self.rows,
            cols: self.cols,
            points: self.points.iter().map(|&p| f(p)).collect(),
        }
    }

    /// Node closest to `p` as `(row, col, point)`; first minimum wins
    pub fn nearest(&self, p: ImagePoint) -> Option<(usize, usize, ImagePoint)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, node) in self.points.iter().enumerate() {
            let d = node.distance(&p);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| (i / self.cols, i % self.cols, self.points[i]))
    }

    /// Lattice edges: all horizontal segments row by row, then all vertical ones
    pub fn segments(&self) -> impl Iterator<Item = (ImagePoint, ImagePoint)> + '_ {
        let horizontal = (0..self.rows).flat_map(move |r| {
            (0..self.cols - 1).map(move |c| {
                let i = r * self.cols + c;
                (self.points[i], self.points[i + 1])
            })
        });
        let vertical = (0..self.cols).flat_map(move |c| {
            (0..self.rows - 1).map(move |r| {
                let i = r * self.cols + c;
                (self.points[i], self.points[i + self.cols])
            })
        });
        horizontal.chain(vertical)
    }
}

/// `n` evenly spaced values from 0 to 1 inclusive
fn linspace(n: usize) -> impl Iterator<Item = f64> {
    let last = (n - 1) as f64;
    (0..n).map(move |i| if i == n - 1 { 1.0 } else { i as f64 / last })
}

/// Generate a `rows x cols` grid by bilinear interpolation of four corners.
///
/// Corner `k` sits at normalized `(r, c)`: 0 at (0, 0), 1 at (0, 1),
/// 2 at (1, 1), 3 at (1, 0). The caller supplies them in cyclic order.
pub fn generate_grid(corners: &[ImagePoint], rows: usize, cols: usize) -> Result<Grid> {
    if corners.len() != 4 {
        return Err(RectifyError::InsufficientCorners { got: corners.len() });
    }
    if rows < 2 || cols < 2 {
        return Err(RectifyError::InvalidGridSize { rows, cols });
    }

    let [c0, c1, c2, c3] = [corners[0], corners[1], corners[2], corners[3]];
    let mut points = Vec::with_capacity(rows * cols);
    for r in linspace(rows) {
        for c in linspace(cols) {
            let w0 = (1.0 - r) * (1.0 - c);
            let w1 = (1.0 - r) * c;
            let w2 = r * c;
            let w3 = r * (1.0 - c);
            points.push(ImagePoint::new(
                c0.x * w0 + c1.x * w1 + c2.x * w2 + c3.x * w3,
                c0.y * w0 + c1.y * w1 + c2.y * w2 + c3.y * w3,
            ));
        }
    }

    Ok(Grid { rows, cols, points })
}

/// Keeps a grid in sync with the corner set and the requested grid size
#[derive(Debug, Clone)]
pub struct GridGenerator {
    corners: Vec<ImagePoint>,
    rows: usize,
    cols: usize,
    grid: Option<Grid>,
}

impl GridGenerator {
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows < 2 || cols < 2 {
            return Err(RectifyError::InvalidGridSize { rows, cols });
        }
        Ok(Self {
            corners: Vec::new(),
            rows,
            cols,
            grid: None,
        })
    }

    pub fn size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Replace the corner snapshot; the grid exists only for exactly 4 corners
    pub fn set_corners(&mut self, corners: &[ImagePoint]) {
        self.corners = corners.to_vec();
        self.regenerate();
    }

    pub fn set_grid_size(&mut self, rows: usize, cols: usize) -> Result<()> {
        if rows < 2 || cols < 2 {
            return Err(RectifyError::InvalidGridSize { rows, cols });
        }
        self.rows = rows;
        self.cols = cols;
        self.regenerate();
        Ok(())
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    /// Install an externally computed grid (e.g. one restored from a snapshot)
    pub(crate) fn restore(&mut self, corners: &[ImagePoint], grid: Option<Grid>) {
        self.corners = corners.to_vec();
        self.grid = grid;
    }

    fn regenerate(&mut self) {
        self.grid = generate_grid(&self.corners, self.rows, self.cols).ok();
        if self.grid.is_some() {
            debug!("Generated grid with {}x{} points", self.rows, self.cols);
        }
    }
}

impl CornerObserver for GridGenerator {
    fn corners_changed(&mut self, _event: &CornerEvent, corners: &[ImagePoint]) {
        self.set_corners(corners);
    }
}
