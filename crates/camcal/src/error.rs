use crate::config::ConfigError;
use crate::report::ReportIoError;
use camcal_core::{BackendError, BoardError, ObservationError};
use std::path::PathBuf;

/// Errors that abort a calibration run.
///
/// A board that cannot be found in one image is not an error; it only lands
/// in [`crate::DetectionSummary::invalid`].
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    #[error(
        "no calibration images found in {}, please ensure that the path is correct",
        dir.display()
    )]
    NoInput { dir: PathBuf },

    #[error(
        "only {found} calibration images found in {}, please include at least {required} images for a proper calibration",
        dir.display()
    )]
    InsufficientInput {
        dir: PathBuf,
        found: usize,
        required: usize,
    },

    #[error("failed to calibrate camera: {reason}")]
    CalibrationFailed { reason: String },

    #[error("failed to read image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write image {}: {source}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error(transparent)]
    Observation(#[from] ObservationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Report(#[from] ReportIoError),
}
