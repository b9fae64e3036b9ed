//! Error types for the rectification core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RectifyError {
    /// An operation that needs exactly four corners was given some other count
    #[error("exactly 4 corner points are required, got {got}")]
    InsufficientCorners { got: usize },

    /// The quad collapses to zero area or projects to an unusable output size
    #[error("degenerate quadrilateral (output {width}x{height})")]
    DegenerateQuad { width: f64, height: f64 },

    #[error("no image loaded")]
    NoImageLoaded,

    #[error("invalid grid size {rows}x{cols} (both must be >= 2)")]
    InvalidGridSize { rows: usize, cols: usize },

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("corner set already holds 4 points")]
    CornerSetFull,

    /// Distortion points pair with a grid node, so they need a grid
    #[error("no grid available (place four corners first)")]
    NoGrid,

    #[error("corner index {index} out of range (len {len})")]
    CornerIndexOutOfRange { index: usize, len: usize },

    /// The rectified raster could not be allocated
    #[error("output raster {width}x{height} is too large")]
    OutputTooLarge { width: u64, height: u64 },
}

pub type Result<T> = std::result::Result<T, RectifyError>;
