#![allow(dead_code)]

use camcal::{
    core::{
        BackendError, CalibrationResult, CameraIntrinsics, DetectionParams, Distortion, ImageSize,
        Observation, PatternSize, Pose, SubPixParams, VisionBackend,
    },
    CalibrationConfig,
};
use image::{GrayImage, Luma};
use nalgebra::{Point2, Vector3};
use std::{
    cell::Cell,
    path::{Path, PathBuf},
};

#[path = "../../src/backend/native/synthetic.rs"]
pub mod synthetic;

/// Backend that "finds" the board in bright images and fails on dark ones.
///
/// Corners are laid out on a regular grid, and calibration returns a fixed
/// distortion-free camera with one pose per view.
#[derive(Default)]
pub struct FakeBackend {
    pub fail_calibration: bool,
    pub calibrate_calls: Cell<usize>,
    pub last_image_size: Cell<Option<ImageSize>>,
    /// Number of observations handed to the last solve.
    pub last_view_count: Cell<usize>,
}

impl FakeBackend {
    pub fn failing() -> Self {
        Self {
            fail_calibration: true,
            ..Self::default()
        }
    }
}

fn mean(gray: &GrayImage) -> f64 {
    let sum: u64 = gray.as_raw().iter().map(|&v| v as u64).sum();
    sum as f64 / gray.as_raw().len().max(1) as f64
}

impl VisionBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn detect_pattern(
        &self,
        gray: &GrayImage,
        pattern: PatternSize,
        _params: &DetectionParams,
    ) -> Result<Option<Vec<Point2<f32>>>, BackendError> {
        if mean(gray) < 128.0 {
            return Ok(None);
        }
        let mut corners = Vec::with_capacity(pattern.corner_count());
        for j in 0..pattern.inner_cols {
            for i in 0..pattern.inner_rows {
                corners.push(Point2::new(4.0 + i as f32 * 4.0, 4.0 + j as f32 * 4.0));
            }
        }
        Ok(Some(corners))
    }

    fn refine_corners(
        &self,
        _gray: &GrayImage,
        corners: &[Point2<f32>],
        _params: &SubPixParams,
    ) -> Result<Vec<Point2<f32>>, BackendError> {
        Ok(corners.iter().map(|p| Point2::new(p.x + 0.25, p.y + 0.25)).collect())
    }

    fn calibrate(
        &self,
        observations: &[Observation],
        image_size: ImageSize,
    ) -> Result<CalibrationResult, BackendError> {
        self.calibrate_calls.set(self.calibrate_calls.get() + 1);
        self.last_image_size.set(Some(image_size));
        self.last_view_count.set(observations.len());
        if self.fail_calibration {
            return Err(BackendError::NotConverged("fake solver gave up".into()));
        }
        let w = image_size.width as f64;
        let h = image_size.height as f64;
        let intrinsics = CameraIntrinsics::from_array(
            [[w, 0.0, w / 2.0], [0.0, w, h / 2.0], [0.0, 0.0, 1.0]],
            Distortion::zero(),
        );
        let poses = (0..observations.len())
            .map(|i| {
                Pose::new(
                    Vector3::new(0.0, 0.01 * i as f64, 0.0),
                    Vector3::new(0.1, 0.2, 1.0 + i as f64),
                )
            })
            .collect();
        Ok(CalibrationResult {
            intrinsics,
            poses,
            rms: 0.1,
        })
    }
}

/// Stage at which [`CornerDropBackend`] loses a corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropStage {
    Detect,
    Refine,
}

/// [`FakeBackend`] that returns one corner too few for images of a given
/// width.
pub struct CornerDropBackend {
    pub inner: FakeBackend,
    pub width: u32,
    pub stage: DropStage,
}

impl CornerDropBackend {
    pub fn new(width: u32, stage: DropStage) -> Self {
        Self {
            inner: FakeBackend::default(),
            width,
            stage,
        }
    }

    fn trim(&self, gray: &GrayImage, stage: DropStage, corners: &mut Vec<Point2<f32>>) {
        if self.stage == stage && gray.width() == self.width {
            corners.pop();
        }
    }
}

impl VisionBackend for CornerDropBackend {
    fn name(&self) -> &str {
        "corner-drop"
    }

    fn detect_pattern(
        &self,
        gray: &GrayImage,
        pattern: PatternSize,
        params: &DetectionParams,
    ) -> Result<Option<Vec<Point2<f32>>>, BackendError> {
        let found = self.inner.detect_pattern(gray, pattern, params)?;
        Ok(found.map(|mut corners| {
            self.trim(gray, DropStage::Detect, &mut corners);
            corners
        }))
    }

    fn refine_corners(
        &self,
        gray: &GrayImage,
        corners: &[Point2<f32>],
        params: &SubPixParams,
    ) -> Result<Vec<Point2<f32>>, BackendError> {
        let mut refined = self.inner.refine_corners(gray, corners, params)?;
        self.trim(gray, DropStage::Refine, &mut refined);
        Ok(refined)
    }

    fn calibrate(
        &self,
        observations: &[Observation],
        image_size: ImageSize,
    ) -> Result<CalibrationResult, BackendError> {
        self.inner.calibrate(observations, image_size)
    }
}

pub fn write_gray(path: &Path, width: u32, height: u32, value: u8) {
    GrayImage::from_pixel(width, height, Luma([value]))
        .save(path)
        .unwrap();
}

/// Fill `dir` with `bright` detectable and `dark` undetectable PNGs.
///
/// Names sort bright images first: `img_00.png`, `img_01.png`, ...
pub fn populate(dir: &Path, bright: usize, dark: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..bright + dark {
        let value = if i < bright { 230 } else { 10 };
        write_gray(&dir.join(format!("img_{i:02}.png")), 64, 48, value);
    }
}

/// Render the shared chessboard views into `dir` as `view_00.png`, ...
/// Returns how many were written.
pub fn render_views(dir: &Path) -> usize {
    let camera = synthetic::test_camera();
    let board = synthetic::test_board();
    let poses = synthetic::test_poses(&board);
    std::fs::create_dir_all(dir).unwrap();
    for (i, (rvec, tvec)) in poses.iter().enumerate() {
        camera
            .render(&board, rvec, tvec)
            .save(dir.join(format!("view_{i:02}.png")))
            .unwrap();
    }
    poses.len()
}

pub struct Workspace {
    pub tmp: tempfile::TempDir,
    pub config: CalibrationConfig,
}

impl Workspace {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = CalibrationConfig {
            image_dir: tmp.path().join("images"),
            undistort_dir: tmp.path().join("undistorted"),
            report_path: tmp.path().join("camera_info.json"),
            ..CalibrationConfig::default()
        };
        Self { tmp, config }
    }

    pub fn image_dir(&self) -> PathBuf {
        self.config.image_dir.clone()
    }
}
