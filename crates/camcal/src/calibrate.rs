//! Calibration solve over the accumulated observations.

use crate::detect::DetectionSummary;
use crate::error::CalibError;
use camcal_core::{CalibrationResult, VisionBackend};
use log::{error, info};

#[cfg(feature = "tracing")]
use tracing::instrument;

fn failed(reason: impl Into<String>) -> CalibError {
    let reason = reason.into();
    error!("failed to calibrate camera: {reason}");
    CalibError::CalibrationFailed { reason }
}

/// Estimate intrinsics and one pose per detected image.
///
/// `result.poses[i]` belongs to `summary.detected[i]`. Any backend failure,
/// and any result that breaks that correspondence or is not finite, is a
/// calibration failure.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(views = summary.detected.len()))
)]
pub fn calibrate<B: VisionBackend + ?Sized>(
    backend: &B,
    summary: &DetectionSummary,
) -> Result<CalibrationResult, CalibError> {
    if summary.detected.is_empty() {
        return Err(failed("no image contained a detectable board"));
    }

    let observations = summary.observations();
    let result = backend
        .calibrate(&observations, summary.reference_size)
        .map_err(|e| failed(e.to_string()))?;

    if !result.rms.is_finite() {
        return Err(failed("solver did not converge"));
    }
    if result.poses.len() != observations.len() {
        return Err(failed(format!(
            "solver returned {} poses for {} views",
            result.poses.len(),
            observations.len()
        )));
    }
    if !result.intrinsics.is_finite() || !result.poses.iter().all(|p| p.is_finite()) {
        return Err(failed("solver returned non-finite parameters"));
    }

    info!(
        "camera successfully calibrated from {} views",
        observations.len()
    );
    Ok(result)
}
