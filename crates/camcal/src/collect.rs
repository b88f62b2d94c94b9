//! Input collection: candidate enumeration and image loading.

use crate::error::CalibError;
use camcal_core::ImageSize;
use image::DynamicImage;
use log::debug;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// One calibration photo.
///
/// Pixel data is never kept here; stages that need it read the file again.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    /// Position in the sorted candidate list.
    pub index: usize,
    pub path: PathBuf,
    /// Name written to the report and used for the undistorted copy.
    pub name: String,
    pub size: ImageSize,
}

impl ImageRecord {
    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }
}

/// Regular files directly inside `dir` whose name ends with one of
/// `extensions`, sorted by path.
///
/// Matching is case-sensitive and hidden files are skipped. A directory that
/// cannot be read yields no candidates.
pub fn collect_candidates(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("cannot read image directory {}: {err}", dir.display());
            return Vec::new();
        }
    };

    let mut out: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && matches_extension(path, extensions))
        .collect();
    out.sort();
    debug!("{} files in {} match {:?}", out.len(), dir.display(), extensions);
    out
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    extensions
        .iter()
        .any(|ext| name.len() > ext.len() && name.ends_with(ext.as_str()))
}

/// Reject runs that cannot produce a meaningful calibration.
pub fn check_candidate_count(dir: &Path, found: usize, required: usize) -> Result<(), CalibError> {
    if found == 0 {
        return Err(CalibError::NoInput {
            dir: dir.to_path_buf(),
        });
    }
    if found < required {
        return Err(CalibError::InsufficientInput {
            dir: dir.to_path_buf(),
            found,
            required,
        });
    }
    Ok(())
}

/// Report name of an image: its path with the image directory prefix and
/// every character in `strip` removed.
pub fn display_name(path: &Path, image_dir: &Path, strip: &[char]) -> String {
    let full = path.to_string_lossy();
    let dir = image_dir.to_string_lossy();
    let rest = full.strip_prefix(dir.as_ref()).unwrap_or(&full);
    rest.chars().filter(|c| !strip.contains(c)).collect()
}

pub fn read_image(path: &Path) -> Result<DynamicImage, CalibError> {
    image::open(path).map_err(|source| CalibError::ImageRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode one candidate and describe it.
pub fn load_image(
    index: usize,
    path: &Path,
    name: String,
) -> Result<(ImageRecord, DynamicImage), CalibError> {
    let img = read_image(path)?;
    let record = ImageRecord {
        index,
        path: path.to_path_buf(),
        name,
        size: ImageSize::new(img.width(), img.height()),
    };
    Ok((record, img))
}
