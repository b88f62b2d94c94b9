//! Joint refinement of intrinsics, distortion and per-view poses.
//!
//! Parameters are laid out as `[fx, fy, cx, cy, k1, k2, p1, p2, k3]`
//! followed by `[rx, ry, rz, tx, ty, tz]` for every view. Residuals are pixel
//! reprojection errors. The Jacobian is taken by forward differences, one
//! view block at a time, and steps come from damped normal equations.

use camcal_core::{Distortion, Observation};
use nalgebra::{DMatrix, DVector, Rotation3, Vector3};

pub(crate) const INTRINSIC_PARAMS: usize = 9;
const POSE_PARAMS: usize = 6;
const LOCAL_PARAMS: usize = INTRINSIC_PARAMS + POSE_PARAMS;

/// Stopping rules for [`refine`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct BundleOptions {
    pub max_iterations: u32,
    /// Relative cost decrease below which the solve stops.
    pub epsilon: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct BundleOutcome {
    pub params: DVector<f64>,
    /// Root mean square reprojection distance in pixels.
    pub rms: f64,
    pub iterations: u32,
}

/// Pixel residuals of one view, two per point; `None` when a point falls
/// behind the camera or the parameters are not finite.
fn view_residuals(local: &[f64; LOCAL_PARAMS], obs: &Observation) -> Option<Vec<f64>> {
    if !local.iter().all(|v| v.is_finite()) {
        return None;
    }
    let [fx, fy, cx, cy] = [local[0], local[1], local[2], local[3]];
    let distortion = Distortion::new(local[4..INTRINSIC_PARAMS].to_vec()).ok()?;
    let rot = Rotation3::from_scaled_axis(Vector3::new(local[9], local[10], local[11]));
    let t = Vector3::new(local[12], local[13], local[14]);

    let mut out = Vec::with_capacity(2 * obs.object_points().len());
    for (p, q) in obs.object_points().iter().zip(obs.image_points()) {
        let pc = rot * p.coords + t;
        if pc.z <= f64::EPSILON {
            return None;
        }
        let (xd, yd) = distortion.distort(pc.x / pc.z, pc.y / pc.z);
        out.push(fx * xd + cx - q.x as f64);
        out.push(fy * yd + cy - q.y as f64);
    }
    Some(out)
}

fn local_params(x: &DVector<f64>, view: usize) -> [f64; LOCAL_PARAMS] {
    let base = INTRINSIC_PARAMS + POSE_PARAMS * view;
    std::array::from_fn(|k| {
        if k < INTRINSIC_PARAMS {
            x[k]
        } else {
            x[base + k - INTRINSIC_PARAMS]
        }
    })
}

fn residuals(x: &DVector<f64>, views: &[Observation]) -> Option<DVector<f64>> {
    let mut all = Vec::new();
    for (v, obs) in views.iter().enumerate() {
        all.extend(view_residuals(&local_params(x, v), obs)?);
    }
    Some(DVector::from_vec(all))
}

fn jacobian(x: &DVector<f64>, views: &[Observation], r: &DVector<f64>) -> Option<DMatrix<f64>> {
    let mut jac = DMatrix::<f64>::zeros(r.len(), x.len());
    let mut row = 0;
    for (v, obs) in views.iter().enumerate() {
        let local = local_params(x, v);
        let rows = 2 * obs.object_points().len();
        let base = r.rows(row, rows);
        for k in 0..LOCAL_PARAMS {
            let h = 1e-6 * local[k].abs().max(1.0);
            let mut bumped = local;
            bumped[k] += h;
            let moved = view_residuals(&bumped, obs)?;
            let col = if k < INTRINSIC_PARAMS {
                k
            } else {
                INTRINSIC_PARAMS + POSE_PARAMS * v + k - INTRINSIC_PARAMS
            };
            for (i, m) in moved.iter().enumerate() {
                jac[(row + i, col)] = (m - base[i]) / h;
            }
        }
        row += rows;
    }
    Some(jac)
}

fn rms(r: &DVector<f64>) -> f64 {
    let points = (r.len() / 2).max(1) as f64;
    (r.norm_squared() / points).sqrt()
}

/// Levenberg-Marquardt from `x0`. Returns `None` if the starting point
/// cannot be evaluated.
pub(crate) fn refine(x0: DVector<f64>, views: &[Observation], opts: &BundleOptions) -> Option<BundleOutcome> {
    let mut x = x0;
    let mut r = residuals(&x, views)?;
    let mut cost = r.norm_squared();
    let mut lambda = 1e-3;
    let mut iterations = 0;

    while iterations < opts.max_iterations {
        iterations += 1;
        let Some(jac) = jacobian(&x, views, &r) else {
            break;
        };
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let grad = &jt * &r;

        let mut improved = false;
        while lambda < 1e12 {
            let mut damped = jtj.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-9);
            }
            let Some(chol) = damped.cholesky() else {
                lambda *= 10.0;
                continue;
            };
            let step = chol.solve(&grad);
            let candidate = &x - &step;
            match residuals(&candidate, views) {
                Some(r_new) if r_new.norm_squared() < cost => {
                    let new_cost = r_new.norm_squared();
                    let decrease = (cost - new_cost) / cost.max(f64::MIN_POSITIVE);
                    x = candidate;
                    r = r_new;
                    cost = new_cost;
                    lambda = (lambda / 10.0).max(1e-12);
                    improved = decrease > opts.epsilon;
                    break;
                }
                _ => lambda *= 10.0,
            }
        }
        if !improved {
            break;
        }
    }

    Some(BundleOutcome {
        params: x,
        rms: rms(&r),
        iterations,
    })
}
