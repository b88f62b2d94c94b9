//! Undistortion maps and remapping.
//!
//! `optimal_new_camera_matrix` + `init_undistort_map` + `remap_bilinear` form
//! the native implementation of the undistortion stage. Backends that carry
//! their own implementation may replace any of them.

use crate::camera::{CameraIntrinsics, ImageSize};
use crate::sampling::sample_bilinear_rgb_u8;
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Point2};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Samples per border when probing the undistorted field of view.
const BORDER_GRID: u32 = 9;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum UndistortError {
    #[error("image size must be non-zero (got {width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("alpha must be finite (got {0})")]
    InvalidAlpha(f64),
    #[error("undistorted field of view is degenerate")]
    DegenerateFieldOfView,
    #[error("map is {map_w}x{map_h} but the image is {img_w}x{img_h}")]
    SizeMismatch {
        map_w: u32,
        map_h: u32,
        img_w: u32,
        img_h: u32,
    },
}

/// Per-pixel source coordinates for an undistorted output image.
#[derive(Clone, Debug, PartialEq)]
pub struct UndistortMap {
    pub size: ImageSize,
    /// Camera matrix of the undistorted image.
    pub new_matrix: Matrix3<f64>,
    /// Row-major, `size.pixel_count()` entries each.
    pub map_x: Vec<f32>,
    pub map_y: Vec<f32>,
}

impl UndistortMap {
    #[inline]
    pub fn source(&self, x: u32, y: u32) -> (f32, f32) {
        let idx = y as usize * self.size.width as usize + x as usize;
        (self.map_x[idx], self.map_y[idx])
    }
}

#[derive(Clone, Copy, Debug)]
struct Rect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

/// Inscribed and circumscribed rectangles of the undistorted image border in
/// normalized coordinates.
fn undistorted_rectangles(intr: &CameraIntrinsics, size: ImageSize) -> (Rect, Rect) {
    let n = BORDER_GRID;
    let (mut ix0, mut ix1, mut iy0, mut iy1) = (f64::MIN, f64::MAX, f64::MIN, f64::MAX);
    let (mut ox0, mut ox1, mut oy0, mut oy1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);

    for gy in 0..n {
        for gx in 0..n {
            let px = Point2::new(
                gx as f64 * size.width as f64 / (n - 1) as f64,
                gy as f64 * size.height as f64 / (n - 1) as f64,
            );
            let d = intr.normalize(px);
            let (x, y) = intr.distortion.undistort(d.x, d.y);

            ox0 = ox0.min(x);
            ox1 = ox1.max(x);
            oy0 = oy0.min(y);
            oy1 = oy1.max(y);

            if gx == 0 {
                ix0 = ix0.max(x);
            }
            if gx == n - 1 {
                ix1 = ix1.min(x);
            }
            if gy == 0 {
                iy0 = iy0.max(y);
            }
            if gy == n - 1 {
                iy1 = iy1.min(y);
            }
        }
    }

    let inner = Rect {
        x: ix0,
        y: iy0,
        w: ix1 - ix0,
        h: iy1 - iy0,
    };
    let outer = Rect {
        x: ox0,
        y: oy0,
        w: ox1 - ox0,
        h: oy1 - oy0,
    };
    (inner, outer)
}

/// Camera matrix for the undistorted image of `size`.
///
/// `alpha = 0` keeps only valid pixels (inscribed rectangle), `alpha = 1`
/// keeps every source pixel (circumscribed rectangle); values in between
/// interpolate linearly.
pub fn optimal_new_camera_matrix(
    intr: &CameraIntrinsics,
    size: ImageSize,
    alpha: f64,
) -> Result<Matrix3<f64>, UndistortError> {
    if size.width == 0 || size.height == 0 {
        return Err(UndistortError::EmptyImage {
            width: size.width,
            height: size.height,
        });
    }
    if !alpha.is_finite() {
        return Err(UndistortError::InvalidAlpha(alpha));
    }

    let (inner, outer) = undistorted_rectangles(intr, size);
    let w = (size.width - 1) as f64;
    let h = (size.height - 1) as f64;

    let project = |r: Rect| -> Option<[f64; 4]> {
        if !(r.w > 0.0 && r.h > 0.0) {
            return None;
        }
        let fx = w / r.w;
        let fy = h / r.h;
        Some([fx, fy, -fx * r.x, -fy * r.y])
    };

    let p_outer = project(outer).ok_or(UndistortError::DegenerateFieldOfView)?;
    let p = if alpha == 1.0 {
        p_outer
    } else {
        let p_inner = project(inner).ok_or(UndistortError::DegenerateFieldOfView)?;
        let mut p = [0.0; 4];
        for k in 0..4 {
            p[k] = p_inner[k] * (1.0 - alpha) + p_outer[k] * alpha;
        }
        p
    };

    let [fx, fy, cx, cy] = p;
    if !(fx.is_finite() && fy.is_finite() && cx.is_finite() && cy.is_finite()) {
        return Err(UndistortError::DegenerateFieldOfView);
    }
    Ok(Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0))
}

/// For each pixel of the undistorted image, the source pixel it samples.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(intr, new_matrix), fields(width = size.width, height = size.height))
)]
pub fn init_undistort_map(
    intr: &CameraIntrinsics,
    new_matrix: &Matrix3<f64>,
    size: ImageSize,
) -> UndistortMap {
    let (nfx, nfy) = (new_matrix[(0, 0)], new_matrix[(1, 1)]);
    let (ncx, ncy) = (new_matrix[(0, 2)], new_matrix[(1, 2)]);

    let mut map_x = Vec::with_capacity(size.pixel_count());
    let mut map_y = Vec::with_capacity(size.pixel_count());
    for v in 0..size.height {
        for u in 0..size.width {
            let x = (u as f64 - ncx) / nfx;
            let y = (v as f64 - ncy) / nfy;
            let (xd, yd) = intr.distortion.distort(x, y);
            let src = intr.denormalize(Point2::new(xd, yd));
            map_x.push(src.x as f32);
            map_y.push(src.y as f32);
        }
    }

    UndistortMap {
        size,
        new_matrix: *new_matrix,
        map_x,
        map_y,
    }
}

/// Resample `src` through `map` with bilinear interpolation.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn remap_bilinear(src: &RgbImage, map: &UndistortMap) -> Result<RgbImage, UndistortError> {
    if src.width() != map.size.width || src.height() != map.size.height {
        return Err(UndistortError::SizeMismatch {
            map_w: map.size.width,
            map_h: map.size.height,
            img_w: src.width(),
            img_h: src.height(),
        });
    }

    Ok(RgbImage::from_fn(map.size.width, map.size.height, |x, y| {
        let (sx, sy) = map.source(x, y);
        Rgb(sample_bilinear_rgb_u8(src, sx, sy))
    }))
}
