//! Interface to the numerical vision library doing the heavy lifting.
//!
//! The pipeline only orchestrates: corner detection, sub-pixel refinement and
//! the calibration solve always go through a [`VisionBackend`]. Undistortion
//! map construction and remapping have native default implementations that a
//! backend may override.

use crate::board::PatternSize;
use crate::camera::{CalibrationResult, CameraIntrinsics, ImageSize};
use crate::observation::Observation;
use crate::undistort::{
    init_undistort_map, optimal_new_camera_matrix, remap_bilinear, UndistortError, UndistortMap,
};
use image::{GrayImage, RgbImage};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("calibration did not converge: {0}")]
    NotConverged(String),
    #[error("invalid backend input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Undistort(#[from] UndistortError),
    #[error("backend error: {0}")]
    Other(String),
}

/// Chessboard search options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Adaptive thresholding instead of a single global level.
    pub adaptive_threshold: bool,
    /// Cheap pre-check that rejects images without a board early.
    pub fast_check: bool,
    /// Histogram equalisation before thresholding.
    pub normalize_image: bool,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            adaptive_threshold: true,
            fast_check: true,
            normalize_image: true,
        }
    }
}

/// Sub-pixel corner refinement options.
///
/// Iteration stops after `max_iterations` or once a corner moves less than
/// `epsilon` pixels, whichever happens first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Search window `[width, height]` handed to the refiner.
    pub window: [u32; 2],
    /// Dead zone in the middle of the window; `[-1, -1]` disables it.
    pub zero_zone: [i32; 2],
    pub max_iterations: u32,
    pub epsilon: f64,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            window: [11, 11],
            zero_zone: [-1, -1],
            max_iterations: 30,
            epsilon: 0.001,
        }
    }
}

pub trait VisionBackend {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Look for the inner-corner grid of `pattern`.
    ///
    /// `Ok(None)` means the board was not found; `Err` is reserved for
    /// failures of the backend itself.
    fn detect_pattern(
        &self,
        gray: &GrayImage,
        pattern: PatternSize,
        params: &DetectionParams,
    ) -> Result<Option<Vec<Point2<f32>>>, BackendError>;

    /// Refine raw corners to sub-pixel accuracy. Output order matches input.
    fn refine_corners(
        &self,
        gray: &GrayImage,
        corners: &[Point2<f32>],
        params: &SubPixParams,
    ) -> Result<Vec<Point2<f32>>, BackendError>;

    /// Joint intrinsic + per-view pose estimation.
    ///
    /// Must return exactly one pose per observation, in the same order.
    fn calibrate(
        &self,
        observations: &[Observation],
        image_size: ImageSize,
    ) -> Result<CalibrationResult, BackendError>;

    /// Undistortion map for an image of `size`, using the camera matrix that
    /// balances cropping against field of view according to `alpha`.
    fn build_undistort_map(
        &self,
        intrinsics: &CameraIntrinsics,
        size: ImageSize,
        alpha: f64,
    ) -> Result<UndistortMap, BackendError> {
        let new_matrix = optimal_new_camera_matrix(intrinsics, size, alpha)?;
        Ok(init_undistort_map(intrinsics, &new_matrix, size))
    }

    fn remap_image(&self, src: &RgbImage, map: &UndistortMap) -> Result<RgbImage, BackendError> {
        Ok(remap_bilinear(src, map)?)
    }
}
