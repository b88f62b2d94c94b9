//! Core types for checkerboard camera calibration.
//!
//! This crate holds the data model shared by every pipeline stage (board
//! geometry, observations, intrinsics and poses), the [`VisionBackend`]
//! interface the pipeline delegates numerical work to, and a native
//! Brown-Conrady undistortion path used when a backend does not provide its
//! own.

mod backend;
mod board;
mod camera;
mod distortion;
mod logger;
mod observation;
mod sampling;
mod undistort;

pub use backend::{BackendError, DetectionParams, SubPixParams, VisionBackend};
pub use board::{BoardError, BoardSpec, PatternSize};
pub use camera::{
    matrix_from_array, matrix_to_array, CalibrationResult, CameraIntrinsics, ImageSize, Pose,
};
pub use distortion::{Distortion, DistortionError};
pub use observation::{Observation, ObservationError};
pub use sampling::{sample_bilinear_gray, sample_bilinear_rgb, sample_bilinear_rgb_u8};
pub use undistort::{
    init_undistort_map, optimal_new_camera_matrix, remap_bilinear, UndistortError, UndistortMap,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
