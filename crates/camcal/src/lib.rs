//! Checkerboard camera calibration from a folder of photos.
//!
//! A run scans an image directory, finds the chessboard in every photo,
//! estimates the camera matrix, distortion coefficients and one pose per
//! usable photo, optionally writes undistorted copies, and stores everything
//! in a JSON report.
//!
//! ```no_run
//! use camcal::{backend::default_backend, pipeline, CalibrationConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CalibrationConfig::default();
//! let backend = default_backend();
//! let run = pipeline::run(&config, backend.as_ref())?;
//! println!("{} views calibrated", run.report.image_data.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - [`collect`]: candidate enumeration and image loading.
//! - [`detect`]: board detection and sub-pixel refinement per image.
//! - [`calibrate`](mod@calibrate): intrinsics and poses from all observations.
//! - [`undistort`]: undistorted copies of the detected images.
//! - [`report`]: the JSON report.
//! - [`pipeline`]: the whole run in order.
//! - [`backend`]: vision backends (pure-Rust native, OpenCV behind `opencv`).
//! - `camcal::core`: shared types from `camcal-core`.

pub mod backend;
pub mod calibrate;
pub mod collect;
pub mod config;
pub mod detect;
mod error;
pub mod pipeline;
pub mod report;
pub mod undistort;

pub use camcal_core as core;

pub use config::{CalibrationConfig, ConfigError};
pub use detect::{DetectedImage, DetectionSummary};
pub use error::CalibError;
pub use pipeline::CalibrationRun;
pub use report::{CalibrationReport, ImageEntry, ReportIoError};
