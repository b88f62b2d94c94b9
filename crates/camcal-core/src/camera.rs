use crate::distortion::Distortion;
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Pinhole intrinsics plus lens distortion.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraIntrinsics {
    pub matrix: Matrix3<f64>,
    pub distortion: Distortion,
}

impl CameraIntrinsics {
    pub fn new(matrix: Matrix3<f64>, distortion: Distortion) -> Self {
        Self { matrix, distortion }
    }

    pub fn from_array(rows: [[f64; 3]; 3], distortion: Distortion) -> Self {
        Self::new(matrix_from_array(rows), distortion)
    }

    pub fn matrix_array(&self) -> [[f64; 3]; 3] {
        matrix_to_array(&self.matrix)
    }

    pub fn fx(&self) -> f64 {
        self.matrix[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.matrix[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.matrix[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.matrix[(1, 2)]
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }

    /// Pixel -> distorted normalized coordinates (skew ignored).
    #[inline]
    pub fn normalize(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new((p.x - self.cx()) / self.fx(), (p.y - self.cy()) / self.fy())
    }

    /// Normalized -> pixel coordinates (skew ignored).
    #[inline]
    pub fn denormalize(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(self.fx() * p.x + self.cx(), self.fy() * p.y + self.cy())
    }
}

pub fn matrix_from_array(rows: [[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_row_slice(&[
        rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
        rows[2][1], rows[2][2],
    ])
}

pub fn matrix_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

/// Board-to-camera pose of one view: Rodrigues rotation vector and translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl Pose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn rvec_array(&self) -> [f64; 3] {
        [self.rvec.x, self.rvec.y, self.rvec.z]
    }

    pub fn tvec_array(&self) -> [f64; 3] {
        [self.tvec.x, self.tvec.y, self.tvec.z]
    }

    pub fn is_finite(&self) -> bool {
        self.rvec.iter().chain(self.tvec.iter()).all(|v| v.is_finite())
    }
}

/// Output of a calibration solve.
///
/// `poses[i]` belongs to the `i`-th observation handed to the solver.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationResult {
    pub intrinsics: CameraIntrinsics,
    pub poses: Vec<Pose>,
    /// Root-mean-square reprojection error reported by the solver, in pixels.
    pub rms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_array_roundtrip_keeps_row_major_layout() {
        let rows = [[800.0, 0.5, 320.0], [0.0, 810.0, 240.0], [0.0, 0.0, 1.0]];
        let k = CameraIntrinsics::from_array(rows, Distortion::zero());
        assert_eq!(k.fx(), 800.0);
        assert_eq!(k.cy(), 240.0);
        assert_eq!(k.matrix[(0, 1)], 0.5);
        assert_eq!(k.matrix_array(), rows);
    }

    #[test]
    fn normalize_then_denormalize_is_identity() {
        let k = CameraIntrinsics::from_array(
            [[500.0, 0.0, 100.0], [0.0, 400.0, 50.0], [0.0, 0.0, 1.0]],
            Distortion::zero(),
        );
        let p = Point2::new(123.0, 77.0);
        let n = k.normalize(p);
        assert!((n.x - 0.046).abs() < 1e-12);
        let back = k.denormalize(n);
        assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
    }
}
