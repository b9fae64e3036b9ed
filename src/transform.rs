//! Perspective rectification of a four-corner quad
//!
//! This module computes the homography that maps the selected quad onto an
//! axis-aligned rectangle, extends it with a translation so the whole source
//! image lands at non-negative coordinates, and warps RGB rasters with it.

use image::RgbImage;
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use tracing::debug;

use crate::config::OutputConfig;
use crate::error::{RectifyError, Result};
use crate::geometry::{ImagePoint, ImageSize};

/// Homogeneous weights at or below this are treated as points at infinity
const W_EPS: f64 = 1e-12;

/// Smallest triangle area (px^2) for which a quad still spans a plane
const MIN_TRIANGLE_AREA: f64 = 1e-6;

/// Slack for sample coordinates that land a hair outside the source raster
const SAMPLE_EPS: f64 = 1e-6;

/// 3x3 projective transform acting on image points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    m: Matrix3<f64>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Pure translation by `(tx, ty)`
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            m: Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0),
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    pub fn to_row_major(&self) -> [f64; 9] {
        let m = &self.m;
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
        ]
    }

    /// Solve the homography mapping `src[i]` onto `dst[i]` for four pairs.
    ///
    /// Fixes `h33 = 1` and solves the remaining eight unknowns directly
    /// (two equations per correspondence). Returns `None` when the system is
    /// singular, i.e. three of the points are collinear.
    pub fn from_correspondences(src: &[ImagePoint; 4], dst: &[ImagePoint; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let (x, y) = (s.x, s.y);
            let (xp, yp) = (d.x, d.y);
            let r = 2 * i;

            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -xp * x;
            a[(r, 7)] = -xp * y;
            b[r] = xp;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -yp * x;
            a[(r + 1, 7)] = -yp * y;
            b[r + 1] = yp;
        }

        let h = a.lu().solve(&b)?;
        if h.iter().any(|v| !v.is_finite()) {
            return None;
        }

        Some(Self {
            m: Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0),
        })
    }

    /// Map a point with perspective division
    #[inline]
    pub fn apply(&self, p: ImagePoint) -> ImagePoint {
        let v = self.m * Vector3::new(p.x, p.y, 1.0);
        ImagePoint::new(v[0] / v[2], v[1] / v[2])
    }

    /// Like [`apply`](Self::apply) but `None` for points mapped to infinity
    pub fn try_apply(&self, p: ImagePoint) -> Option<ImagePoint> {
        let v = self.m * Vector3::new(p.x, p.y, 1.0);
        if !v[2].is_finite() || v[2].abs() <= W_EPS {
            return None;
        }
        let out = ImagePoint::new(v[0] / v[2], v[1] / v[2]);
        out.is_finite().then_some(out)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.m.try_inverse().map(|m| Self { m })
    }

    /// `other · self`: apply `self` first, then `other`
    pub fn then(&self, other: &Homography) -> Self {
        Self { m: other.m * self.m }
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

/// Result of rectifying one quad on an image of known size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectification {
    /// Quad -> target rectangle at the origin
    homography: Homography,
    /// Translation that pulls the whole warped image into positive coordinates
    offset: (f64, f64),
    /// `offset · homography`; use this for rasters and point sets alike
    transform: Homography,
    target_width: f64,
    target_height: f64,
    output: ImageSize,
}

impl Rectification {
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    pub fn transform(&self) -> &Homography {
        &self.transform
    }

    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    /// Size of the rectangle the quad is mapped onto
    pub fn target_size(&self) -> (f64, f64) {
        (self.target_width, self.target_height)
    }

    /// Size of the raster that holds the whole warped image
    pub fn output_size(&self) -> ImageSize {
        self.output
    }

    /// Map a point from the source image into the output raster
    pub fn apply(&self, p: ImagePoint) -> ImagePoint {
        self.transform.apply(p)
    }
}

fn triangle_area(a: ImagePoint, b: ImagePoint, c: ImagePoint) -> f64 {
    ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)) / 2.0
}

fn degenerate(width: f64, height: f64) -> RectifyError {
    RectifyError::DegenerateQuad { width, height }
}

/// Compute the rectifying transform for an ordered quad on an image.
///
/// `corners` must be in top-left, top-right, bottom-right, bottom-left order
/// (see [`order_corners`](crate::ordering::order_corners)). The target
/// rectangle keeps the longer edge of each opposite pair.
pub fn compute_rectification(corners: &[ImagePoint; 4], image: ImageSize) -> Result<Rectification> {
    let [c0, c1, c2, c3] = *corners;

    let width = c0.distance(&c1).max(c3.distance(&c2));
    let height = c0.distance(&c3).max(c1.distance(&c2));
    if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
        return Err(degenerate(width, height));
    }

    // Any three collinear corners make the 8x8 system singular
    let spans_plane = (0..4).all(|i| {
        triangle_area(corners[i], corners[(i + 1) % 4], corners[(i + 2) % 4]).abs() > MIN_TRIANGLE_AREA
    });
    if !spans_plane {
        debug!("Rejecting quad with collinear corners: {:?}", corners);
        return Err(degenerate(f64::NAN, f64::NAN));
    }

    let target = [
        ImagePoint::new(0.0, 0.0),
        ImagePoint::new(width, 0.0),
        ImagePoint::new(width, height),
        ImagePoint::new(0.0, height),
    ];
    let homography =
        Homography::from_correspondences(corners, &target).ok_or_else(|| degenerate(f64::NAN, f64::NAN))?;

    // A corner on the horizon line has no finite image; the bounds become
    // infinite and the size check below rejects the quad.
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for corner in image.corners() {
        let p = homography
            .try_apply(corner)
            .unwrap_or(ImagePoint::new(f64::INFINITY, f64::INFINITY));
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let tx = if min_x < 0.0 { -min_x } else { 0.0 };
    let ty = if min_y < 0.0 { -min_y } else { 0.0 };
    let out_w = if min_x < 0.0 { max_x - min_x } else { max_x };
    let out_h = if min_y < 0.0 { max_y - min_y } else { max_y };

    let (out_w, out_h) = (out_w.round(), out_h.round());
    if !(out_w.is_finite() && out_h.is_finite()) || out_w < 1.0 || out_h < 1.0 {
        return Err(degenerate(out_w, out_h));
    }
    if out_w > u32::MAX as f64 || out_h > u32::MAX as f64 {
        return Err(RectifyError::OutputTooLarge {
            width: out_w as u64,
            height: out_h as u64,
        });
    }

    let transform = homography.then(&Homography::translation(tx, ty));
    let output = ImageSize::new(out_w as u32, out_h as u32);
    debug!(
        "Rectification: target {:.1}x{:.1}, output {}x{}, offset ({:.1}, {:.1})",
        width, height, output.width, output.height, tx, ty
    );

    Ok(Rectification {
        homography,
        offset: (tx, ty),
        transform,
        target_width: width,
        target_height: height,
        output,
    })
}

/// Allocate a zeroed RGB buffer, surfacing size overflow and allocation failure
fn allocate_rgb(size: ImageSize, max_pixels: u64) -> Result<Vec<u8>> {
    let too_large = || RectifyError::OutputTooLarge {
        width: size.width as u64,
        height: size.height as u64,
    };

    let pixels = (size.width as u64)
        .checked_mul(size.height as u64)
        .ok_or_else(too_large)?;
    if pixels > max_pixels {
        return Err(too_large());
    }
    let bytes = usize::try_from(pixels)
        .ok()
        .and_then(|p| p.checked_mul(3))
        .ok_or_else(too_large)?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes).map_err(|_| too_large())?;
    buf.resize(bytes, 0);
    Ok(buf)
}

/// Warp an RGB image into the rectification's output raster.
///
/// Each output pixel is mapped back through the inverse transform and
/// sampled bilinearly; pixels that fall outside the source get `fill`.
pub fn warp_image(src: &RgbImage, rect: &Rectification, output: &OutputConfig) -> Result<RgbImage> {
    let inverse = rect
        .transform
        .inverse()
        .ok_or_else(|| degenerate(rect.target_width, rect.target_height))?;
    let size = rect.output;
    let mut dst = allocate_rgb(size, output.max_pixels)?;

    let src_w = src.width() as usize;
    let src_h = src.height() as usize;
    let src_raw = src.as_raw();
    let dst_stride = size.width as usize * 3;

    for dst_y in 0..size.height as usize {
        let row = &mut dst[dst_y * dst_stride..(dst_y + 1) * dst_stride];
        for (dst_x, pixel) in row.chunks_exact_mut(3).enumerate() {
            let s = inverse.apply(ImagePoint::new(dst_x as f64, dst_y as f64));
            let value = bilinear_sample(src_raw, src_w, src_h, s.x, s.y).unwrap_or(output.fill);
            pixel.copy_from_slice(&value);
        }
    }

    RgbImage::from_raw(size.width, size.height, dst).ok_or(RectifyError::OutputTooLarge {
        width: size.width as u64,
        height: size.height as u64,
    })
}

/// Bilinear RGB sample at a fractional position, `None` outside the raster
#[inline]
fn bilinear_sample(src: &[u8], width: usize, height: usize, x: f64, y: f64) -> Option<[u8; 3]> {
    if width == 0 || height == 0 || !x.is_finite() || !y.is_finite() {
        return None;
    }
    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;
    if x < -SAMPLE_EPS || y < -SAMPLE_EPS || x > max_x + SAMPLE_EPS || y > max_y + SAMPLE_EPS {
        return None;
    }
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;
    let stride = width * 3;

    let mut result = [0u8; 3];
    for (c, out) in result.iter_mut().enumerate() {
        let p00 = src[y0 * stride + x0 * 3 + c] as f64;
        let p10 = src[y0 * stride + x1 * 3 + c] as f64;
        let p01 = src[y1 * stride + x0 * 3 + c] as f64;
        let p11 = src[y1 * stride + x1 * 3 + c] as f64;

        let value = p00 * (1.0 - fx) * (1.0 - fy)
            + p10 * fx * (1.0 - fy)
            + p01 * (1.0 - fx) * fy
            + p11 * fx * fy;

        *out = value.round().clamp(0.0, 255.0) as u8;
    }

    Some(result)
}
