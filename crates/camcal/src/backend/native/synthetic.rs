//! Rendered chessboard views with known geometry, for tests.
//!
//! Board coordinates follow the object-point template: the first inner
//! corner sits at the origin, inner corner `(i, j)` at `(i * square,
//! j * square, 0)`. Squares are surrounded by a one-square white margin on a
//! gray background.

#![allow(dead_code)]

use image::{GrayImage, Luma};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

const DARK: f64 = 30.0;
const LIGHT: f64 = 225.0;
const BACKGROUND: f64 = 90.0;

#[derive(Clone, Copy, Debug)]
pub struct SyntheticBoard {
    /// Squares along the first board axis.
    pub rows: u32,
    /// Squares along the second board axis.
    pub cols: u32,
    pub square: f64,
}

impl SyntheticBoard {
    pub fn inner_corners(&self) -> Vec<Point3<f64>> {
        let mut out = Vec::new();
        for j in 0..self.cols - 1 {
            for i in 0..self.rows - 1 {
                out.push(Point3::new(
                    i as f64 * self.square,
                    j as f64 * self.square,
                    0.0,
                ));
            }
        }
        out
    }

    pub fn center(&self) -> Vector3<f64> {
        Vector3::new(
            (self.rows - 2) as f64 * self.square / 2.0,
            (self.cols - 2) as f64 * self.square / 2.0,
            0.0,
        )
    }

    fn intensity(&self, x: f64, y: f64) -> f64 {
        let (sx, sy) = (x / self.square, y / self.square);
        let (rows, cols) = (self.rows as f64, self.cols as f64);
        if sx < -2.0 || sy < -2.0 || sx > rows || sy > cols {
            return BACKGROUND;
        }
        if sx < -1.0 || sy < -1.0 || sx > rows - 1.0 || sy > cols - 1.0 {
            return LIGHT;
        }
        if (sx.floor() as i64 + sy.floor() as i64).rem_euclid(2) == 0 {
            DARK
        } else {
            LIGHT
        }
    }
}

/// Pinhole camera without distortion.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticCamera {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
}

impl SyntheticCamera {
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    pub fn project(&self, rvec: &Vector3<f64>, tvec: &Vector3<f64>, p: &Point3<f64>) -> Point2<f64> {
        let pc = Rotation3::from_scaled_axis(*rvec) * p.coords + tvec;
        Point2::new(
            self.fx * pc.x / pc.z + self.cx,
            self.fy * pc.y / pc.z + self.cy,
        )
    }

    /// Board plane to pixel homography `K [r1 r2 t]`.
    pub fn homography(&self, rvec: &Vector3<f64>, tvec: &Vector3<f64>) -> Matrix3<f64> {
        let r = Rotation3::from_scaled_axis(*rvec);
        let m = r.matrix();
        self.matrix() * Matrix3::from_columns(&[m.column(0).into_owned(), m.column(1).into_owned(), *tvec])
    }

    /// Render `board` seen from `(rvec, tvec)` with 2x2 supersampling.
    pub fn render(&self, board: &SyntheticBoard, rvec: &Vector3<f64>, tvec: &Vector3<f64>) -> GrayImage {
        let Some(inv) = self.homography(rvec, tvec).try_inverse() else {
            return GrayImage::from_pixel(self.width, self.height, Luma([BACKGROUND as u8]));
        };
        let offsets = [-0.25, 0.25];
        GrayImage::from_fn(self.width, self.height, |px, py| {
            let mut acc = 0.0;
            for dy in offsets {
                for dx in offsets {
                    let q = inv * Vector3::new(px as f64 + dx, py as f64 + dy, 1.0);
                    acc += board.intensity(q.x / q.z, q.y / q.z);
                }
            }
            Luma([(acc / 4.0).round() as u8])
        })
    }
}

/// 480x360 camera used across the tests.
pub fn test_camera() -> SyntheticCamera {
    SyntheticCamera {
        fx: 450.0,
        fy: 445.0,
        cx: 241.0,
        cy: 178.0,
        width: 480,
        height: 360,
    }
}

/// 7x6 squares, so 6x5 inner corners.
pub fn test_board() -> SyntheticBoard {
    SyntheticBoard {
        rows: 7,
        cols: 6,
        square: 1.0,
    }
}

/// Tilted views keeping the whole board inside the test camera's frame.
pub fn test_poses(board: &SyntheticBoard) -> Vec<(Vector3<f64>, Vector3<f64>)> {
    let views = [
        ((0.30, 0.00, 0.00), (0.2, -0.1, 12.0)),
        ((-0.30, 0.05, 0.00), (-0.3, 0.2, 12.5)),
        ((0.00, 0.30, 0.05), (0.1, 0.3, 11.5)),
        ((0.05, -0.30, 0.00), (-0.2, -0.3, 12.0)),
        ((0.20, 0.20, 0.10), (0.4, 0.1, 13.0)),
        ((-0.20, 0.25, -0.10), (-0.4, -0.2, 12.5)),
        ((0.25, -0.20, 0.20), (0.0, 0.4, 12.0)),
        ((-0.25, -0.20, -0.20), (0.3, -0.4, 13.0)),
        ((0.10, 0.35, 0.30), (-0.1, 0.0, 12.5)),
        ((0.35, -0.10, -0.30), (0.0, -0.1, 13.0)),
    ];
    let center = board.center();
    views
        .iter()
        .map(|&((rx, ry, rz), (dx, dy, z))| {
            let r = Rotation3::from_euler_angles(rx, ry, rz);
            let tvec = Vector3::new(dx, dy, z) - r * center;
            (r.scaled_axis(), tvec)
        })
        .collect()
}
