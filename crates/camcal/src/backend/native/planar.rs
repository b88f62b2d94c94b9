//! Linear initialisation for planar-target calibration.
//!
//! Per-view homographies come from a normalised DLT. The initial camera
//! keeps the principal point at the image centre and fits both focal
//! lengths in closed form from the orthogonality of each view's rotation
//! columns; poses then fall out of `K^-1 H`.

use camcal_core::{BackendError, ImageSize};
use nalgebra::{DMatrix, Matrix2, Matrix3, Point2, Rotation3, Vector2, Vector3};

fn invalid(msg: impl Into<String>) -> BackendError {
    BackendError::InvalidInput(msg.into())
}

/// Translate to the centroid and scale to a mean distance of `sqrt(2)`.
fn hartley(points: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = points.len().max(1) as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let normalized = points
        .iter()
        .map(|p| Point2::new((p.x - cx) * s, (p.y - cy) * s))
        .collect();
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    (normalized, t)
}

/// Plane-to-image homography `H` with `image ~ H * (x, y, 1)`.
pub(crate) fn homography(plane: &[Point2<f64>], image: &[Point2<f64>]) -> Result<Matrix3<f64>, BackendError> {
    let n = plane.len();
    if n < 4 || image.len() != n {
        return Err(invalid(format!("homography needs at least 4 point pairs, got {n}")));
    }
    let (src, ts) = hartley(plane);
    let (dst, td) = hartley(image);

    // Zero rows keep the system at least 9x9 so the thin SVD exposes the
    // whole null space.
    let mut a = DMatrix::<f64>::zeros((2 * n).max(9), 9);
    for (i, (s, d)) in src.iter().zip(&dst).enumerate() {
        let (x, y, u, v) = (s.x, s.y, d.x, d.y);
        let (r0, r1) = (2 * i, 2 * i + 1);
        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;
        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| BackendError::NotConverged("homography SVD failed".into()))?;
    let (smallest, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| BackendError::NotConverged("homography SVD is empty".into()))?;
    let h = v_t.row(smallest);
    let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let td_inv = td
        .try_inverse()
        .ok_or_else(|| invalid("degenerate image points"))?;
    let mut hm = td_inv * hn * ts;
    if hm[(2, 2)].abs() > f64::EPSILON {
        hm /= hm[(2, 2)];
    }
    if !hm.iter().all(|v| v.is_finite()) {
        return Err(BackendError::NotConverged("homography is not finite".into()));
    }
    Ok(hm)
}

/// Initial camera matrix from per-view homographies.
///
/// The principal point is put at the image centre. Both focal lengths come
/// from a linear least-squares fit of `1/fx^2, 1/fy^2`; when the views carry
/// no focal information (all fronto-parallel), the larger image side is used.
pub(crate) fn initial_camera(homographies: &[Matrix3<f64>], size: ImageSize) -> Matrix3<f64> {
    let cx = (size.width as f64 - 1.0) * 0.5;
    let cy = (size.height as f64 - 1.0) * 0.5;

    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();
    for hm in homographies {
        let mut h = *hm;
        for c in 0..3 {
            h[(0, c)] -= h[(2, c)] * cx;
            h[(1, c)] -= h[(2, c)] * cy;
        }
        let col0 = h.column(0).into_owned();
        let col1 = h.column(1).into_owned();
        let d1 = (col0 + col1) * 0.5;
        let d2 = (col0 - col1) * 0.5;
        let (h0, v0, d1, d2) = (
            col0.normalize(),
            col1.normalize(),
            d1.normalize(),
            d2.normalize(),
        );

        for (row, rhs) in [
            (Vector2::new(h0.x * v0.x, h0.y * v0.y), -h0.z * v0.z),
            (Vector2::new(d1.x * d2.x, d1.y * d2.y), -d1.z * d2.z),
        ] {
            if row.iter().chain([&rhs]).all(|v| v.is_finite()) {
                ata += row * row.transpose();
                atb += row * rhs;
            }
        }
    }

    let fallback = size.width.max(size.height) as f64;
    let (fx, fy) = match ata.try_inverse().map(|inv| inv * atb) {
        Some(f) if f.x.abs() > 0.0 && f.y.abs() > 0.0 => {
            let fx = (1.0 / f.x.abs()).sqrt();
            let fy = (1.0 / f.y.abs()).sqrt();
            if fx.is_finite() && fy.is_finite() && fx > 1.0 && fy > 1.0 {
                (fx, fy)
            } else {
                (fallback, fallback)
            }
        }
        _ => (fallback, fallback),
    };
    Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0)
}

/// Board pose from its homography: `[r1 r2 t] ~ K^-1 H`, with the rotation
/// projected onto SO(3) and the board kept in front of the camera.
pub(crate) fn pose_from_homography(
    k: &Matrix3<f64>,
    hm: &Matrix3<f64>,
) -> Result<(Vector3<f64>, Vector3<f64>), BackendError> {
    let k_inv = k
        .try_inverse()
        .ok_or_else(|| invalid("camera matrix is singular"))?;
    let r1 = k_inv * hm.column(0);
    let r2 = k_inv * hm.column(1);
    let t = k_inv * hm.column(2);

    let norm = 0.5 * (r1.norm() + r2.norm());
    if norm <= f64::EPSILON {
        return Err(BackendError::NotConverged("degenerate homography".into()));
    }
    let mut lambda = 1.0 / norm;
    if t.z < 0.0 {
        lambda = -lambda;
    }
    let (r1, r2, t) = (r1 * lambda, r2 * lambda, t * lambda);
    let r = Matrix3::from_columns(&[r1, r2, r1.cross(&r2)]);

    let svd = r.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(BackendError::NotConverged("rotation SVD failed".into())),
    };
    let mut rot = u * v_t;
    if rot.determinant() < 0.0 {
        let mut u = u;
        u.column_mut(2).neg_mut();
        rot = u * v_t;
    }
    let rvec = Rotation3::from_matrix_unchecked(rot).scaled_axis();
    Ok((rvec, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::native::synthetic::{test_board, test_camera, test_poses};
    use approx::assert_relative_eq;

    fn plane_and_image(view: usize) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
        let camera = test_camera();
        let board = test_board();
        let (rvec, tvec) = test_poses(&board)[view];
        let object = board.inner_corners();
        let plane = object.iter().map(|p| Point2::new(p.x, p.y)).collect();
        let image = object.iter().map(|p| camera.project(&rvec, &tvec, p)).collect();
        (plane, image)
    }

    #[test]
    fn homography_matches_the_projection() {
        let camera = test_camera();
        let (rvec, tvec) = test_poses(&test_board())[2];
        let (plane, image) = plane_and_image(2);
        let h = homography(&plane, &image).unwrap();
        let mut expected = camera.homography(&rvec, &tvec);
        expected /= expected[(2, 2)];
        assert_relative_eq!(h, expected, epsilon = 1e-6, max_relative = 1e-6);
    }

    #[test]
    fn too_few_points_are_rejected() {
        let p = vec![Point2::new(0.0, 0.0); 3];
        assert!(matches!(homography(&p, &p), Err(BackendError::InvalidInput(_))));
    }

    #[test]
    fn initial_camera_is_close_and_poses_are_exact_given_k() {
        let camera = test_camera();
        let board = test_board();
        let poses = test_poses(&board);
        let hs: Vec<_> = (0..poses.len())
            .map(|v| {
                let (plane, image) = plane_and_image(v);
                homography(&plane, &image).unwrap()
            })
            .collect();

        let k = initial_camera(&hs, ImageSize::new(camera.width, camera.height));
        assert_relative_eq!(k[(0, 2)], 239.5);
        assert!((k[(0, 0)] - camera.fx).abs() / camera.fx < 0.1, "fx = {}", k[(0, 0)]);
        assert!((k[(1, 1)] - camera.fy).abs() / camera.fy < 0.1, "fy = {}", k[(1, 1)]);

        for (h, (rvec, tvec)) in hs.iter().zip(&poses) {
            let (r, t) = pose_from_homography(&camera.matrix(), h).unwrap();
            assert_relative_eq!(r, *rvec, epsilon = 1e-6);
            assert_relative_eq!(t, *tvec, epsilon = 1e-5);
        }
    }

    #[test]
    fn fronto_parallel_views_fall_back_to_image_size() {
        let hs = [Matrix3::new(500.0, 0.0, 100.0, 0.0, 500.0, 80.0, 0.0, 0.0, 1.0)];
        let k = initial_camera(&hs, ImageSize::new(640, 480));
        assert_relative_eq!(k[(0, 0)], 640.0);
        assert_relative_eq!(k[(1, 1)], 640.0);
    }
}
