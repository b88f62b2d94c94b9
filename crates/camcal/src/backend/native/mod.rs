//! Pure-Rust backend.
//!
//! Corner candidates come from the `chess-corners` ChESS detector and are
//! assembled into the board grid by local growth; refinement is the classic gradient
//! orthogonality iteration. The solve initialises from per-view homographies
//! and finishes with a Levenberg-Marquardt pass over intrinsics, five
//! distortion coefficients and every pose. Undistortion uses the trait's
//! native defaults.

mod bundle;
mod chess;
mod grid;
mod planar;
mod subpix;
#[cfg(test)]
pub(crate) mod synthetic;

use self::bundle::{BundleOptions, INTRINSIC_PARAMS};
use self::grid::GridParams;
use camcal_core::{
    BackendError, CalibrationResult, CameraIntrinsics, DetectionParams, Distortion, ImageSize,
    Observation, PatternSize, Pose, SubPixParams, VisionBackend,
};
use image::GrayImage;
use log::debug;
use nalgebra::{DVector, Point2, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Detector and solver tuning for [`NativeBackend`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeParams {
    /// ChESS responses below this fraction of the strongest one are ignored.
    pub threshold_rel: f32,
    pub nms_radius: u32,
    /// Search radius around a predicted grid corner, relative to the local
    /// corner spacing.
    pub grid_tolerance: f32,
    /// Seed corners tried per image before the board is declared missing.
    pub max_seeds: usize,
    pub solver_max_iterations: u32,
    /// Relative cost decrease that ends the solve.
    pub solver_epsilon: f64,
}

impl Default for NativeParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
            grid_tolerance: 0.35,
            max_seeds: 8,
            solver_max_iterations: 100,
            solver_epsilon: 1e-10,
        }
    }
}

/// [`VisionBackend`] built on `chess-corners`, `image` and `nalgebra`.
///
/// `DetectionParams::normalize_image` stretches the contrast before the
/// corner search; the adaptive-threshold and fast-check switches only mean
/// something to OpenCV's detector and are ignored here.
#[derive(Clone, Debug, Default)]
pub struct NativeBackend {
    pub params: NativeParams,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: NativeParams) -> Self {
        Self { params }
    }
}

fn to_pixels(points: &[Point2<f32>]) -> Vec<Point2<f64>> {
    points
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect()
}

impl VisionBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    fn detect_pattern(
        &self,
        gray: &GrayImage,
        pattern: PatternSize,
        params: &DetectionParams,
    ) -> Result<Option<Vec<Point2<f32>>>, BackendError> {
        if pattern.inner_rows < 2 || pattern.inner_cols < 2 {
            return Err(BackendError::InvalidInput(format!(
                "need at least 2x2 inner corners, got {}x{}",
                pattern.inner_rows, pattern.inner_cols
            )));
        }
        let img = if params.normalize_image {
            Cow::Owned(chess::stretch_contrast(gray))
        } else {
            Cow::Borrowed(gray)
        };

        let cfg = chess::chess_config(self.params.threshold_rel, self.params.nms_radius);
        let peaks = chess::find_peaks(&img, &cfg);
        debug!("{} corner candidates", peaks.len());

        let grid = GridParams {
            tolerance: self.params.grid_tolerance,
            max_seeds: self.params.max_seeds,
        };
        Ok(grid::assemble_grid(&peaks, pattern, &grid))
    }

    fn refine_corners(
        &self,
        gray: &GrayImage,
        corners: &[Point2<f32>],
        params: &SubPixParams,
    ) -> Result<Vec<Point2<f32>>, BackendError> {
        Ok(subpix::refine(gray, corners, params))
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(views = observations.len()))
    )]
    fn calibrate(
        &self,
        observations: &[Observation],
        image_size: ImageSize,
    ) -> Result<CalibrationResult, BackendError> {
        if observations.is_empty() {
            return Err(BackendError::InvalidInput("no observations".into()));
        }
        if image_size.width == 0 || image_size.height == 0 {
            return Err(BackendError::InvalidInput("empty image size".into()));
        }

        let mut homographies = Vec::with_capacity(observations.len());
        for obs in observations {
            if obs.object_points().iter().any(|p| p.z.abs() > 1e-9) {
                return Err(BackendError::InvalidInput(
                    "calibration target must be planar (z = 0)".into(),
                ));
            }
            let plane: Vec<_> = obs
                .object_points()
                .iter()
                .map(|p| Point2::new(p.x, p.y))
                .collect();
            homographies.push(planar::homography(&plane, &to_pixels(obs.image_points()))?);
        }

        let k = planar::initial_camera(&homographies, image_size);
        debug!(
            "initial camera: fx {:.1} fy {:.1} cx {:.1} cy {:.1}",
            k[(0, 0)],
            k[(1, 1)],
            k[(0, 2)],
            k[(1, 2)]
        );

        let mut x0 = DVector::zeros(INTRINSIC_PARAMS + 6 * observations.len());
        x0[0] = k[(0, 0)];
        x0[1] = k[(1, 1)];
        x0[2] = k[(0, 2)];
        x0[3] = k[(1, 2)];
        for (v, h) in homographies.iter().enumerate() {
            let (rvec, tvec) = planar::pose_from_homography(&k, h)?;
            let base = INTRINSIC_PARAMS + 6 * v;
            x0.rows_mut(base, 3).copy_from(&rvec);
            x0.rows_mut(base + 3, 3).copy_from(&tvec);
        }

        let opts = BundleOptions {
            max_iterations: self.params.solver_max_iterations,
            epsilon: self.params.solver_epsilon,
        };
        let out = bundle::refine(x0, observations, &opts).ok_or_else(|| {
            BackendError::NotConverged("initial estimate puts the board behind the camera".into())
        })?;
        debug!(
            "solve stopped after {} iterations, rms {:.4} px",
            out.iterations, out.rms
        );
        let x = &out.params;

        let distortion = Distortion::new(x.rows(4, 5).iter().copied().collect())
            .map_err(|e| BackendError::NotConverged(e.to_string()))?;
        let intrinsics = CameraIntrinsics::from_array(
            [[x[0], 0.0, x[2]], [0.0, x[1], x[3]], [0.0, 0.0, 1.0]],
            distortion,
        );
        let poses = (0..observations.len())
            .map(|v| {
                let base = INTRINSIC_PARAMS + 6 * v;
                let rvec = Vector3::new(x[base], x[base + 1], x[base + 2]);
                let tvec = Vector3::new(x[base + 3], x[base + 4], x[base + 5]);
                Pose::new(Rotation3::from_scaled_axis(rvec).scaled_axis(), tvec)
            })
            .collect();

        Ok(CalibrationResult {
            intrinsics,
            poses,
            rms: out.rms,
        })
    }
}
