//! Calibration report: the JSON file a run leaves behind.

use crate::config::CalibrationConfig;
use crate::detect::DetectedImage;
use crate::error::CalibError;
use camcal_core::{CalibrationResult, CameraIntrinsics, Distortion, DistortionError};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ReportIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Per-image part of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub img_name: String,
    pub tvec: [f64; 3],
    pub rvec: [f64; 3],
    pub height: u32,
    pub width: u32,
    /// File name of the undistorted copy, when undistortion ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_distorted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub camera_matrix: [[f64; 3]; 3],
    pub distortion: Vec<f64>,
    pub image_dir_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undistort_image_dir_path: Option<String>,
    pub image_data: Vec<ImageEntry>,
}

impl CalibrationReport {
    /// Pair every detected image with its pose.
    ///
    /// Poses are matched by position, so `detected` must be in candidate
    /// order (strictly increasing `record.index`) and as long as `poses`.
    pub fn new(
        config: &CalibrationConfig,
        detected: &[DetectedImage],
        result: &CalibrationResult,
    ) -> Result<Self, CalibError> {
        if detected.len() != result.poses.len() {
            return Err(CalibError::CalibrationFailed {
                reason: format!(
                    "{} poses for {} detected images",
                    result.poses.len(),
                    detected.len()
                ),
            });
        }

        if let Some(pair) = detected
            .windows(2)
            .find(|pair| pair[0].record.index >= pair[1].record.index)
        {
            return Err(CalibError::CalibrationFailed {
                reason: format!(
                    "detections out of candidate order: {} (#{}) follows {} (#{})",
                    pair[1].record.name, pair[1].record.index, pair[0].record.name, pair[0].record.index
                ),
            });
        }

        let image_data = detected
            .iter()
            .zip(&result.poses)
            .map(|(det, pose)| ImageEntry {
                img_name: det.record.name.clone(),
                tvec: pose.tvec_array(),
                rvec: pose.rvec_array(),
                height: det.record.height(),
                width: det.record.width(),
                img_distorted: None,
            })
            .collect();

        Ok(Self {
            camera_matrix: result.intrinsics.matrix_array(),
            distortion: result.intrinsics.distortion.coeffs().to_vec(),
            image_dir_path: config.image_dir.to_string_lossy().into_owned(),
            undistort_image_dir_path: None,
            image_data,
        })
    }

    /// Record where undistorted copies were written.
    ///
    /// `names[i]` belongs to `image_data[i]`.
    pub fn set_undistorted(&mut self, dir: &Path, names: Vec<String>) {
        self.undistort_image_dir_path = Some(dir.to_string_lossy().into_owned());
        for (entry, name) in self.image_data.iter_mut().zip(names) {
            entry.img_distorted = Some(name);
        }
    }

    /// Intrinsics stored in the report.
    pub fn intrinsics(&self) -> Result<CameraIntrinsics, DistortionError> {
        Ok(CameraIntrinsics::from_array(
            self.camera_matrix,
            Distortion::new(self.distortion.clone())?,
        ))
    }

    /// Pretty JSON with four-space indentation.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ReportIoError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReportIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk.
    ///
    /// The JSON is fully rendered before anything is opened, and it lands via
    /// a temporary file renamed over `path`, so readers never see a partial
    /// report and a failed write leaves any previous file untouched.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReportIoError> {
        let json = self.to_json_bytes()?;
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
