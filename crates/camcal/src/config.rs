//! Run configuration and its JSON representation.

use camcal_core::{BoardError, BoardSpec, DetectionParams, SubPixParams};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_extensions() -> Vec<String> {
    [".png", ".jpg", ".jpeg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_images() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_undistort_dir() -> PathBuf {
    PathBuf::from("undistorted_images")
}

fn default_alpha() -> f64 {
    1.0
}

fn default_report_path() -> PathBuf {
    PathBuf::from("camera_info.json")
}

fn default_name_strip_chars() -> Vec<char> {
    vec!['\\', '/']
}

/// Everything a calibration run needs to know up front.
///
/// Every field has a default, so a JSON file only has to list what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Directory scanned (non-recursively) for calibration photos.
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    /// File-name suffixes that select images. Matching is case-sensitive.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Runs with fewer candidate images are rejected before any processing.
    #[serde(default = "default_min_images")]
    pub min_images: usize,
    /// Interactive preview of each image. Not supported; only logged.
    #[serde(default)]
    pub show_images: bool,
    #[serde(default = "default_true")]
    pub undistort_images: bool,
    #[serde(default = "default_undistort_dir")]
    pub undistort_dir: PathBuf,
    /// `1.0` keeps every source pixel in the undistorted output, `0.0` crops
    /// to valid pixels only.
    #[serde(default = "default_alpha")]
    pub undistort_alpha: f64,
    #[serde(default)]
    pub board: BoardSpec,
    #[serde(default)]
    pub detection: DetectionParams,
    #[serde(default)]
    pub subpix: SubPixParams,
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
    /// Characters removed from the image-directory-relative path to form the
    /// name recorded in the report.
    #[serde(default = "default_name_strip_chars")]
    pub name_strip_chars: Vec<char>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            extensions: default_extensions(),
            min_images: default_min_images(),
            show_images: false,
            undistort_images: true,
            undistort_dir: default_undistort_dir(),
            undistort_alpha: default_alpha(),
            board: BoardSpec::default(),
            detection: DetectionParams::default(),
            subpix: SubPixParams::default(),
            report_path: default_report_path(),
            name_strip_chars: default_name_strip_chars(),
        }
    }
}

impl CalibrationConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.board.validate()?;
        if self.min_images == 0 {
            return Err(ConfigError::Invalid("min_images must be at least 1".into()));
        }
        if self.extensions.is_empty() || self.extensions.iter().any(|e| e.is_empty()) {
            return Err(ConfigError::Invalid(
                "extensions must be a non-empty list of non-empty suffixes".into(),
            ));
        }
        if !self.undistort_alpha.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "undistort_alpha must be finite (got {})",
                self.undistort_alpha
            )));
        }
        if self.subpix.window.contains(&0) {
            return Err(ConfigError::Invalid(
                "subpix window must be at least 1x1".into(),
            ));
        }
        if self.subpix.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "subpix max_iterations must be at least 1".into(),
            ));
        }
        if !(self.subpix.epsilon.is_finite() && self.subpix.epsilon >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "subpix epsilon must be finite and non-negative (got {})",
                self.subpix.epsilon
            )));
        }
        Ok(())
    }
}
