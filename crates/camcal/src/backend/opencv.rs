use camcal_core::{
    matrix_from_array, BackendError, CalibrationResult, CameraIntrinsics, DetectionParams,
    Distortion, ImageSize, Observation, PatternSize, Pose, SubPixParams, UndistortMap,
    VisionBackend,
};
use image::GrayImage;
use log::debug;
use nalgebra::{Matrix3, Point2, Vector3};
use opencv::{
    calib3d,
    core::{self, DataType, Mat, Point2f, Point3f, Size, TermCriteria, Vector},
    imgproc,
    prelude::*,
};

fn cv_err(err: opencv::Error) -> BackendError {
    BackendError::Other(err.to_string())
}

fn to_i32(v: u32, what: &str) -> Result<i32, BackendError> {
    i32::try_from(v).map_err(|_| BackendError::InvalidInput(format!("{what} {v} out of range")))
}

fn cv_size(size: ImageSize) -> Result<Size, BackendError> {
    Ok(Size::new(
        to_i32(size.width, "width")?,
        to_i32(size.height, "height")?,
    ))
}

/// Owned single-channel `Mat` copied from a row-major slice.
fn mat_from_slice<T: DataType>(rows: i32, cols: i32, data: &[T]) -> Result<Mat, BackendError> {
    let view = Mat::new_rows_cols_with_data(rows, cols, data).map_err(cv_err)?;
    view.try_clone().map_err(cv_err)
}

fn gray_mat(gray: &GrayImage) -> Result<Mat, BackendError> {
    mat_from_slice(
        to_i32(gray.height(), "height")?,
        to_i32(gray.width(), "width")?,
        gray.as_raw().as_slice(),
    )
}

fn camera_mat(rows: [[f64; 3]; 3]) -> Result<Mat, BackendError> {
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    mat_from_slice(3, 3, &flat)
}

fn read_matrix(m: &Mat) -> Result<Matrix3<f64>, BackendError> {
    let mut rows = [[0.0; 3]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = *m.at_2d::<f64>(r as i32, c as i32).map_err(cv_err)?;
        }
    }
    Ok(matrix_from_array(rows))
}

fn read_vec3(m: &Mat) -> Result<Vector3<f64>, BackendError> {
    let data = m.data_typed::<f64>().map_err(cv_err)?;
    match data {
        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
        _ => Err(BackendError::Other(format!(
            "expected a 3-vector, got {} values",
            data.len()
        ))),
    }
}

fn criteria(max_iterations: u32, epsilon: f64) -> Result<TermCriteria, BackendError> {
    TermCriteria::new(
        core::TermCriteria_Type::COUNT as i32 | core::TermCriteria_Type::EPS as i32,
        i32::try_from(max_iterations).unwrap_or(i32::MAX),
        epsilon,
    )
    .map_err(cv_err)
}

/// [`VisionBackend`] on top of OpenCV's `calib3d` and `imgproc` modules.
#[derive(Clone, Debug)]
pub struct OpenCvBackend {
    /// Flags handed to `calibrateCamera`.
    pub calibration_flags: i32,
    pub solver_max_iterations: u32,
    pub solver_epsilon: f64,
}

impl Default for OpenCvBackend {
    fn default() -> Self {
        Self {
            calibration_flags: 0,
            solver_max_iterations: 30,
            solver_epsilon: f64::EPSILON,
        }
    }
}

impl OpenCvBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn detection_flags(params: &DetectionParams) -> i32 {
        let mut flags = 0;
        if params.adaptive_threshold {
            flags |= calib3d::CALIB_CB_ADAPTIVE_THRESH;
        }
        if params.fast_check {
            flags |= calib3d::CALIB_CB_FAST_CHECK;
        }
        if params.normalize_image {
            flags |= calib3d::CALIB_CB_NORMALIZE_IMAGE;
        }
        flags
    }
}

impl VisionBackend for OpenCvBackend {
    fn name(&self) -> &str {
        "opencv"
    }

    fn detect_pattern(
        &self,
        gray: &GrayImage,
        pattern: PatternSize,
        params: &DetectionParams,
    ) -> Result<Option<Vec<Point2<f32>>>, BackendError> {
        let img = gray_mat(gray)?;
        let size = Size::new(
            to_i32(pattern.inner_rows, "pattern rows")?,
            to_i32(pattern.inner_cols, "pattern cols")?,
        );
        let mut corners = Vector::<Point2f>::new();
        let found = calib3d::find_chessboard_corners(
            &img,
            size,
            &mut corners,
            Self::detection_flags(params),
        )
        .map_err(cv_err)?;
        if !found {
            return Ok(None);
        }
        Ok(Some(
            corners.iter().map(|p| Point2::new(p.x, p.y)).collect(),
        ))
    }

    fn refine_corners(
        &self,
        gray: &GrayImage,
        corners: &[Point2<f32>],
        params: &SubPixParams,
    ) -> Result<Vec<Point2<f32>>, BackendError> {
        let img = gray_mat(gray)?;
        let mut pts: Vector<Point2f> = corners.iter().map(|p| Point2f::new(p.x, p.y)).collect();
        imgproc::corner_sub_pix(
            &img,
            &mut pts,
            Size::new(
                to_i32(params.window[0], "window width")?,
                to_i32(params.window[1], "window height")?,
            ),
            Size::new(params.zero_zone[0], params.zero_zone[1]),
            criteria(params.max_iterations, params.epsilon)?,
        )
        .map_err(cv_err)?;
        Ok(pts.iter().map(|p| Point2::new(p.x, p.y)).collect())
    }

    fn calibrate(
        &self,
        observations: &[Observation],
        image_size: ImageSize,
    ) -> Result<CalibrationResult, BackendError> {
        if observations.is_empty() {
            return Err(BackendError::InvalidInput("no observations".into()));
        }

        let mut object_points = Vector::<Vector<Point3f>>::new();
        let mut image_points = Vector::<Vector<Point2f>>::new();
        for obs in observations {
            object_points.push(
                obs.object_points()
                    .iter()
                    .map(|p| Point3f::new(p.x as f32, p.y as f32, p.z as f32))
                    .collect(),
            );
            image_points.push(
                obs.image_points()
                    .iter()
                    .map(|p| Point2f::new(p.x, p.y))
                    .collect(),
            );
        }

        let mut camera_matrix = Mat::default();
        let mut dist_coeffs = Mat::default();
        let mut rvecs = Vector::<Mat>::new();
        let mut tvecs = Vector::<Mat>::new();
        let rms = calib3d::calibrate_camera(
            &object_points,
            &image_points,
            cv_size(image_size)?,
            &mut camera_matrix,
            &mut dist_coeffs,
            &mut rvecs,
            &mut tvecs,
            self.calibration_flags,
            criteria(self.solver_max_iterations, self.solver_epsilon)?,
        )
        .map_err(|e| BackendError::NotConverged(e.to_string()))?;
        debug!("calibrateCamera rms = {rms:.4}");

        let coeffs = dist_coeffs.data_typed::<f64>().map_err(cv_err)?.to_vec();
        let distortion =
            Distortion::new(coeffs).map_err(|e| BackendError::Other(e.to_string()))?;
        let intrinsics = CameraIntrinsics::new(read_matrix(&camera_matrix)?, distortion);

        let poses = rvecs
            .iter()
            .zip(tvecs.iter())
            .map(|(r, t)| Ok(Pose::new(read_vec3(&r)?, read_vec3(&t)?)))
            .collect::<Result<Vec<_>, BackendError>>()?;

        Ok(CalibrationResult {
            intrinsics,
            poses,
            rms,
        })
    }

    fn build_undistort_map(
        &self,
        intrinsics: &CameraIntrinsics,
        size: ImageSize,
        alpha: f64,
    ) -> Result<UndistortMap, BackendError> {
        let k = camera_mat(intrinsics.matrix_array())?;
        let coeffs = intrinsics.distortion.coeffs();
        let d = mat_from_slice(1, coeffs.len() as i32, coeffs)?;
        let cv_size = cv_size(size)?;

        let mut roi = core::Rect::default();
        let new_k = calib3d::get_optimal_new_camera_matrix(
            &k, &d, cv_size, alpha, cv_size, &mut roi, false,
        )
        .map_err(cv_err)?;

        let mut map_x = Mat::default();
        let mut map_y = Mat::default();
        calib3d::init_undistort_rectify_map(
            &k,
            &d,
            &Mat::default(),
            &new_k,
            cv_size,
            core::CV_32FC1,
            &mut map_x,
            &mut map_y,
        )
        .map_err(cv_err)?;

        Ok(UndistortMap {
            size,
            new_matrix: read_matrix(&new_k)?,
            map_x: map_x.data_typed::<f32>().map_err(cv_err)?.to_vec(),
            map_y: map_y.data_typed::<f32>().map_err(cv_err)?.to_vec(),
        })
    }
}
