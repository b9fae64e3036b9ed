//! quadrect - four-corner perspective rectification
//!
//! The user marks four corners on an image; this crate maps clicks between
//! viewport and image space, keeps a bilinear preview grid spanning the
//! corners, pairs distortion markers with grid nodes, and rectifies the quad
//! to an axis-aligned rectangle while keeping the whole source image inside
//! the output raster. A
//! [`RectificationSession`] toggles the rectified preview on and off and
//! restores the original state exactly.

pub mod config;
pub mod corners;
pub mod distortion;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod ordering;
pub mod overlay;
pub mod session;
pub mod transform;
pub mod view;

pub use corners::{CornerEvent, CornerObserver, CornerSet};
pub use distortion::{DistortionPoint, DistortionSet};
pub use error::{RectifyError, Result};
pub use geometry::{ImagePoint, ImageSize, ViewportPoint, ViewportSize};
pub use grid::{generate_grid, Grid, GridGenerator};
pub use ordering::order_corners;
pub use session::{FrameView, RectificationSession, SessionState, SharedSession};
pub use transform::{compute_rectification, warp_image, Homography, Rectification};
pub use view::{ViewState, ViewTransform, Zoom};
