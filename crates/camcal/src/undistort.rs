//! Undistorted copies of the detected images.

use crate::collect::read_image;
use crate::config::CalibrationConfig;
use crate::detect::DetectedImage;
use crate::error::CalibError;
use camcal_core::{CameraIntrinsics, ImageSize, UndistortMap, VisionBackend};
use log::{debug, info};
use std::{
    collections::{hash_map::Entry, HashMap},
    fs,
    path::{Path, PathBuf},
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// File name used for the undistorted copy of an image.
pub fn output_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

fn ensure_dir(dir: &Path) -> Result<(), CalibError> {
    fs::create_dir_all(dir).map_err(|source| CalibError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write an undistorted copy of every detected image into
/// `config.undistort_dir`.
///
/// Returns the written file names, one per entry of `detected` and in the
/// same order. Maps are built once per distinct image size.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(images = detected.len()))
)]
pub fn undistort_images<B: VisionBackend + ?Sized>(
    backend: &B,
    config: &CalibrationConfig,
    detected: &[DetectedImage],
    intrinsics: &CameraIntrinsics,
) -> Result<Vec<String>, CalibError> {
    let out_dir = &config.undistort_dir;
    ensure_dir(out_dir)?;

    let mut maps: HashMap<ImageSize, UndistortMap> = HashMap::new();
    let mut written = Vec::with_capacity(detected.len());

    for det in detected {
        let src = read_image(&det.record.path)?.to_rgb8();
        let size = ImageSize::new(src.width(), src.height());

        let map = match maps.entry(size) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                debug!("building undistortion map for {}x{}", size.width, size.height);
                e.insert(backend.build_undistort_map(intrinsics, size, config.undistort_alpha)?)
            }
        };

        let out = backend.remap_image(&src, map)?;
        let file_name = output_file_name(&det.record.name);
        let out_path: PathBuf = out_dir.join(&file_name);
        out.save(&out_path)
            .map_err(|source| CalibError::ImageWrite {
                path: out_path.clone(),
                source,
            })?;
        info!("undistorted {} -> {}", det.record.name, out_path.display());
        written.push(file_name);
    }

    Ok(written)
}
