//! Brown-Conrady lens distortion in normalized image coordinates.
//!
//! Coefficients follow the usual calibration order
//! `[k1, k2, p1, p2, k3, k4, k5, k6]`. Four-, five- and eight-element vectors
//! are accepted; missing trailing terms are zero.

use serde::{Deserialize, Serialize};

const UNDISTORT_MAX_ITERS: usize = 20;
const UNDISTORT_EPS: f64 = 1e-12;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DistortionError {
    #[error("unsupported distortion coefficient count {0} (expected 4, 5 or 8)")]
    UnsupportedLength(usize),
    #[error("distortion coefficient {index} is not finite")]
    NonFinite { index: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Distortion {
    coeffs: Vec<f64>,
}

impl Distortion {
    pub fn new(coeffs: Vec<f64>) -> Result<Self, DistortionError> {
        if !matches!(coeffs.len(), 4 | 5 | 8) {
            return Err(DistortionError::UnsupportedLength(coeffs.len()));
        }
        if let Some(index) = coeffs.iter().position(|c| !c.is_finite()) {
            return Err(DistortionError::NonFinite { index });
        }
        Ok(Self { coeffs })
    }

    /// Five zero coefficients.
    pub fn zero() -> Self {
        Self {
            coeffs: vec![0.0; 5],
        }
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    fn at(&self, idx: usize) -> f64 {
        self.coeffs.get(idx).copied().unwrap_or(0.0)
    }

    fn terms(&self) -> Terms {
        Terms {
            k1: self.at(0),
            k2: self.at(1),
            p1: self.at(2),
            p2: self.at(3),
            k3: self.at(4),
            k4: self.at(5),
            k5: self.at(6),
            k6: self.at(7),
        }
    }

    /// Apply the lens model to an ideal normalized point.
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let t = self.terms();
        let r2 = x * x + y * y;
        let kr = t.radial(r2);
        let xd = x * kr + 2.0 * t.p1 * x * y + t.p2 * (r2 + 2.0 * x * x);
        let yd = y * kr + t.p1 * (r2 + 2.0 * y * y) + 2.0 * t.p2 * x * y;
        (xd, yd)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, xd: f64, yd: f64) -> (f64, f64) {
        let t = self.terms();
        let (mut x, mut y) = (xd, yd);
        for _ in 0..UNDISTORT_MAX_ITERS {
            let r2 = x * x + y * y;
            let kr = t.radial(r2);
            if kr.abs() < f64::EPSILON {
                break;
            }
            let dx = 2.0 * t.p1 * x * y + t.p2 * (r2 + 2.0 * x * x);
            let dy = t.p1 * (r2 + 2.0 * y * y) + 2.0 * t.p2 * x * y;
            let nx = (xd - dx) / kr;
            let ny = (yd - dy) / kr;
            let step = (nx - x).abs().max((ny - y).abs());
            x = nx;
            y = ny;
            if step < UNDISTORT_EPS {
                break;
            }
        }
        (x, y)
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Self::zero()
    }
}

impl TryFrom<Vec<f64>> for Distortion {
    type Error = DistortionError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Distortion> for Vec<f64> {
    fn from(value: Distortion) -> Self {
        value.coeffs
    }
}

struct Terms {
    k1: f64,
    k2: f64,
    p1: f64,
    p2: f64,
    k3: f64,
    k4: f64,
    k5: f64,
    k6: f64,
}

impl Terms {
    #[inline]
    fn radial(&self, r2: f64) -> f64 {
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        (1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6)
            / (1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6)
    }
}
