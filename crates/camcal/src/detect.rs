//! Board detection over every candidate image.

use crate::collect::{display_name, load_image, ImageRecord};
use crate::config::CalibrationConfig;
use crate::error::CalibError;
use camcal_core::{ImageSize, Observation, PatternSize, VisionBackend};
use image::GrayImage;
use log::{info, warn};
use nalgebra::Point2;
use std::path::PathBuf;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// An image whose board was found, with the observation it contributes.
#[derive(Clone, Debug)]
pub struct DetectedImage {
    pub record: ImageRecord,
    pub observation: Observation,
}

/// Outcome of the detection stage.
#[derive(Clone, Debug)]
pub struct DetectionSummary {
    /// Successful detections in candidate order.
    pub detected: Vec<DetectedImage>,
    /// Names of images without a usable board.
    pub invalid: Vec<String>,
    /// Size of the last image read; the calibration is solved for it.
    pub reference_size: ImageSize,
    /// Number of candidates examined.
    pub total: usize,
}

impl DetectionSummary {
    pub fn observations(&self) -> Vec<Observation> {
        self.detected.iter().map(|d| d.observation.clone()).collect()
    }
}

/// Find and refine the board in a single grayscale image.
///
/// Returns `Ok(None)` when the backend does not see the board or reports a
/// corner count that does not match `pattern`.
pub fn detect_corners<B: VisionBackend + ?Sized>(
    backend: &B,
    gray: &GrayImage,
    pattern: PatternSize,
    config: &CalibrationConfig,
) -> Result<Option<Vec<Point2<f32>>>, CalibError> {
    let expected = pattern.corner_count();
    let Some(raw) = backend.detect_pattern(gray, pattern, &config.detection)? else {
        return Ok(None);
    };
    if raw.len() != expected {
        warn!(
            "detector returned {} corners, expected {expected}; ignoring",
            raw.len()
        );
        return Ok(None);
    }

    let refined = backend.refine_corners(gray, &raw, &config.subpix)?;
    if refined.len() != expected {
        warn!(
            "refinement returned {} corners, expected {expected}; ignoring",
            refined.len()
        );
        return Ok(None);
    }
    Ok(Some(refined))
}

/// Run detection over `candidates`, in order.
///
/// Missing boards are recorded and skipped. Unreadable images and backend
/// failures abort the stage.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(candidates = candidates.len(), backend = backend.name()))
)]
pub fn detect_boards<B: VisionBackend + ?Sized>(
    backend: &B,
    config: &CalibrationConfig,
    candidates: &[PathBuf],
) -> Result<DetectionSummary, CalibError> {
    let pattern = config.board.pattern_size();
    let object_points = config.board.object_points();

    if config.show_images {
        warn!("interactive image display is not supported; show_images is ignored");
    }

    let mut detected = Vec::new();
    let mut invalid = Vec::new();
    let mut reference_size = None;

    for (index, path) in candidates.iter().enumerate() {
        let name = display_name(path, &config.image_dir, &config.name_strip_chars);
        info!("loading image {name}");

        let (record, img) = load_image(index, path, name)?;
        let gray = img.to_luma8();
        drop(img);
        reference_size = Some(record.size);

        match detect_corners(backend, &gray, pattern, config)? {
            Some(corners) => {
                info!("board found");
                let observation = Observation::new(object_points.clone(), corners)?;
                detected.push(DetectedImage {
                    record,
                    observation,
                });
            }
            None => {
                info!("board not found!");
                invalid.push(record.name);
            }
        }
    }

    let reference_size = reference_size.ok_or_else(|| CalibError::NoInput {
        dir: config.image_dir.clone(),
    })?;

    info!("{}/{} images were invalid", invalid.len(), candidates.len());
    if detected.iter().any(|d| d.record.size != reference_size) {
        warn!(
            "calibration images differ in size; solving for {}x{}",
            reference_size.width, reference_size.height
        );
    }

    Ok(DetectionSummary {
        detected,
        invalid,
        reference_size,
        total: candidates.len(),
    })
}
