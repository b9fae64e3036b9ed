//! Canonical ordering of four corner points
//!
//! Points are sorted by angle around their centroid (ascending `atan2`, which
//! is clockwise on screen since y grows downwards) and the cycle is rotated
//! so the point nearest the top-left (smallest `x + y`) comes first.

use std::cmp::Ordering;

use crate::error::{RectifyError, Result};
use crate::geometry::ImagePoint;

/// Order exactly four points into a clockwise cycle starting near the top-left.
///
/// Ties on angle or on `x + y` go to the point that comes first in `points`.
/// Degenerate input (collinear or repeated points) is ordered without failing.
pub fn order_corners(points: &[ImagePoint]) -> Result<[ImagePoint; 4]> {
    let quad: [ImagePoint; 4] = match points {
        [a, b, c, d] => [*a, *b, *c, *d],
        other => return Err(RectifyError::InsufficientCorners { got: other.len() }),
    };

    let cx = quad.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = quad.iter().map(|p| p.y).sum::<f64>() / 4.0;

    // Input index rides along so ties resolve to the earliest input point
    let mut by_angle: Vec<(f64, usize, ImagePoint)> = quad
        .iter()
        .enumerate()
        .map(|(i, p)| ((p.y - cy).atan2(p.x - cx), i, *p))
        .collect();
    // Stable sort; NaN angles (non-finite input) compare equal
    by_angle.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut start = 0;
    for (i, &(_, index, p)) in by_angle.iter().enumerate() {
        let (_, best_index, best) = by_angle[start];
        let (sum, best_sum) = (p.x + p.y, best.x + best.y);
        if sum < best_sum || (sum == best_sum && index < best_index) {
            start = i;
        }
    }

    let mut ordered = [ImagePoint::default(); 4];
    for (k, slot) in ordered.iter_mut().enumerate() {
        *slot = by_angle[(start + k) % 4].2;
    }
    Ok(ordered)
}
