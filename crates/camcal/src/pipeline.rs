//! End-to-end calibration run.

use crate::calibrate::calibrate;
use crate::collect::{check_candidate_count, collect_candidates};
use crate::config::CalibrationConfig;
use crate::detect::detect_boards;
use crate::error::CalibError;
use crate::report::CalibrationReport;
use crate::undistort::undistort_images;
use camcal_core::VisionBackend;
use log::info;
use std::path::PathBuf;

/// What a successful run produced.
#[derive(Clone, Debug)]
pub struct CalibrationRun {
    pub report: CalibrationReport,
    /// Images in which no board was found.
    pub invalid_images: Vec<String>,
    pub report_path: PathBuf,
}

/// Collect, detect, calibrate, optionally undistort, then write the report.
///
/// Input problems are reported before anything is written. The undistort
/// directory only appears once calibration has succeeded.
pub fn run<B: VisionBackend + ?Sized>(
    config: &CalibrationConfig,
    backend: &B,
) -> Result<CalibrationRun, CalibError> {
    config.validate()?;
    info!(
        "starting calibration on {} with backend {}",
        config.image_dir.display(),
        backend.name()
    );

    if !config.image_dir.is_dir() {
        return Err(CalibError::NoInput {
            dir: config.image_dir.clone(),
        });
    }
    let candidates = collect_candidates(&config.image_dir, &config.extensions);
    check_candidate_count(&config.image_dir, candidates.len(), config.min_images)?;
    info!("{} calibration images found", candidates.len());

    let summary = detect_boards(backend, config, &candidates)?;
    info!(
        "calibrating from {} of {} images",
        summary.detected.len(),
        summary.total
    );
    let result = calibrate(backend, &summary)?;

    let mut report = CalibrationReport::new(config, &summary.detected, &result)?;
    if config.undistort_images {
        let names = undistort_images(backend, config, &summary.detected, &result.intrinsics)?;
        report.set_undistorted(&config.undistort_dir, names);
    }

    report.write_json(&config.report_path)?;
    info!("wrote {}", config.report_path.display());

    Ok(CalibrationRun {
        report,
        invalid_images: summary.invalid,
        report_path: config.report_path.clone(),
    })
}
