//! Gradient-based sub-pixel corner refinement.
//!
//! Around a true corner `c`, the image gradient at every point `q` is
//! orthogonal to `q - c`. Solving that weighted least-squares system gives a
//! new estimate; the window is re-centred and the step repeated.

use camcal_core::{sample_bilinear_gray, SubPixParams};
use image::GrayImage;
use nalgebra::Point2;

struct Window {
    half_w: i32,
    half_h: i32,
    weights: Vec<f64>,
}

impl Window {
    /// Gaussian weights over `(2 * half_w + 1) x (2 * half_h + 1)` with the
    /// zero zone cut out. A negative zero-zone size disables it.
    fn new(params: &SubPixParams) -> Self {
        let half_w = params.window[0].max(1) as i32;
        let half_h = params.window[1].max(1) as i32;
        let [zx, zy] = params.zero_zone;
        let mut weights = Vec::with_capacity(((2 * half_w + 1) * (2 * half_h + 1)) as usize);
        for dy in -half_h..=half_h {
            for dx in -half_w..=half_w {
                let dead = zx >= 0 && zy >= 0 && dx.abs() <= zx && dy.abs() <= zy;
                let (u, v) = (dx as f64 / half_w as f64, dy as f64 / half_h as f64);
                weights.push(if dead { 0.0 } else { (-(u * u) - v * v).exp() });
            }
        }
        Self {
            half_w,
            half_h,
            weights,
        }
    }
}

fn refine_one(gray: &GrayImage, start: Point2<f32>, win: &Window, params: &SubPixParams) -> Point2<f32> {
    let sample = |x: f64, y: f64| sample_bilinear_gray(gray, x as f32, y as f32) as f64;
    let eps2 = params.epsilon * params.epsilon;
    let (mut cx, mut cy) = (start.x as f64, start.y as f64);

    for _ in 0..params.max_iterations.max(1) {
        let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
        let (mut bb1, mut bb2) = (0.0, 0.0);
        let mut weights = win.weights.iter();
        for dy in -win.half_h..=win.half_h {
            for dx in -win.half_w..=win.half_w {
                let w = weights.next().copied().unwrap_or(0.0);
                if w == 0.0 {
                    continue;
                }
                let (px, py) = (cx + dx as f64, cy + dy as f64);
                let gx = (sample(px + 1.0, py) - sample(px - 1.0, py)) * 0.5;
                let gy = (sample(px, py + 1.0) - sample(px, py - 1.0)) * 0.5;

                let (gxx, gxy, gyy) = (gx * gx * w, gx * gy * w, gy * gy * w);
                a += gxx;
                b += gxy;
                c += gyy;
                bb1 += gxx * px + gxy * py;
                bb2 += gxy * px + gyy * py;
            }
        }

        let det = a * c - b * b;
        if det.abs() <= f64::EPSILON * f64::EPSILON {
            break;
        }
        let nx = (c * bb1 - b * bb2) / det;
        let ny = (a * bb2 - b * bb1) / det;
        let shift2 = (nx - cx).powi(2) + (ny - cy).powi(2);
        cx = nx;
        cy = ny;
        if shift2 <= eps2 {
            break;
        }
    }

    let drifted = (cx - start.x as f64).abs() > win.half_w as f64
        || (cy - start.y as f64).abs() > win.half_h as f64;
    if !cx.is_finite() || !cy.is_finite() || drifted {
        return start;
    }
    Point2::new(cx as f32, cy as f32)
}

/// Refine every corner; a corner that would leave its window keeps its
/// input position.
pub(crate) fn refine(gray: &GrayImage, corners: &[Point2<f32>], params: &SubPixParams) -> Vec<Point2<f32>> {
    if gray.width() == 0 || gray.height() == 0 {
        return corners.to_vec();
    }
    let win = Window::new(params);
    corners
        .iter()
        .map(|&c| refine_one(gray, c, &win, params))
        .collect()
}
