// src/core/pnp.rs
//
// Perspective-n-point for planar targets: homography initialisation
// followed by Levenberg-Marquardt on the pixel reprojection error.

use nalgebra::{DMatrix, DVector, Matrix3, Rotation3, SMatrix, SVector, Vector2, Vector3};

use crate::core::camera::CameraCalibration;
use crate::{Error, Result};

const MAX_LM_ITERS: usize = 50;
const JACOBIAN_STEP: f64 = 1e-6;

/// Rotation matrix of an axis-angle vector.
pub fn rodrigues(rvec: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::from_scaled_axis(*rvec).into_inner()
}

/// Axis-angle vector of a rotation matrix.
pub fn rotation_vector(r: &Matrix3<f64>) -> Vector3<f64> {
    Rotation3::from_matrix_unchecked(*r).scaled_axis()
}

/// Closest rotation to `m` in the Frobenius sense.
fn project_to_so3(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = m.svd(true, true);
    let mut u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        u.column_mut(2).neg_mut();
        r = u * v_t;
    }
    Some(r)
}

/// DLT homography from plane coordinates to normalized image coordinates,
/// taken from the smallest eigenvector of `AᵀA`.
fn plane_homography(plane: &[Vector2<f64>], image: &[Vector2<f64>]) -> Option<Matrix3<f64>> {
    // `None` when every point coincides.
    fn normalizer(pts: &[Vector2<f64>]) -> Option<Matrix3<f64>> {
        let n = pts.len() as f64;
        let c = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p) / n;
        let d = pts.iter().map(|p| (p - c).norm()).sum::<f64>() / n;
        if d <= 1e-12 {
            return None;
        }
        let s = std::f64::consts::SQRT_2 / d;
        Some(Matrix3::new(s, 0.0, -s * c.x, 0.0, s, -s * c.y, 0.0, 0.0, 1.0))
    }

    let t_src = normalizer(plane)?;
    let t_dst = normalizer(image)?;
    let apply = |t: &Matrix3<f64>, p: &Vector2<f64>| {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        Vector2::new(v.x, v.y)
    };

    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (p, q) in plane.iter().zip(image) {
        let s = apply(&t_src, p);
        let (x, y) = (s.x, s.y);
        let d = apply(&t_dst, q);
        let rows = [
            SVector::<f64, 9>::from_column_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -d.x * x, -d.x * y, -d.x]),
            SVector::<f64, 9>::from_column_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -d.y * x, -d.y * y, -d.y]),
        ];
        for r in rows {
            ata += r * r.transpose();
        }
    }

    let eig = ata.symmetric_eigen();
    let (min_idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = eig.eigenvectors.column(min_idx);
    let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let h = t_dst.try_inverse()? * hn * t_src;
    h.iter().all(|v| v.is_finite()).then_some(h)
}

/// Decomposes `H ~ [r1 r2 t]` into a rotation and translation with the
/// target in front of the camera.
fn pose_from_homography(h: &Matrix3<f64>) -> Option<(Matrix3<f64>, Vector3<f64>)> {
    let h1 = h.column(0).into_owned();
    let h2 = h.column(1).into_owned();
    let h3 = h.column(2).into_owned();

    let norm = (h1.norm() + h2.norm()) / 2.0;
    if norm < 1e-12 {
        return None;
    }
    let mut scale = 1.0 / norm;
    if h3.z * scale < 0.0 {
        scale = -scale;
    }

    let r1 = h1 * scale;
    let r2 = h2 * scale;
    let r3 = r1.cross(&r2);
    // Parallel columns: the image points collapsed onto a line or a point.
    if r3.norm() < 1e-6 * r1.norm() * r2.norm() {
        return None;
    }
    let r = project_to_so3(&Matrix3::from_columns(&[r1, r2, r3]))?;
    Some((r, h3 * scale))
}

fn residuals(
    params: &SVector<f64, 6>,
    object: &[Vector3<f64>],
    image: &[Vector2<f64>],
    camera: &CameraCalibration,
) -> DVector<f64> {
    let r = rodrigues(&params.fixed_rows::<3>(0).into_owned());
    let t = params.fixed_rows::<3>(3).into_owned();
    let mut out = DVector::zeros(2 * object.len());
    for (i, (x, u)) in object.iter().zip(image).enumerate() {
        let p = camera.project(&(r * x + t));
        out[2 * i] = p.x - u.x;
        out[2 * i + 1] = p.y - u.y;
    }
    out
}

fn refine_lm(
    init: SVector<f64, 6>,
    object: &[Vector3<f64>],
    image: &[Vector2<f64>],
    camera: &CameraCalibration,
) -> SVector<f64, 6> {
    let mut params = init;
    let mut res = residuals(&params, object, image, camera);
    let mut cost = res.norm_squared();
    let mut lambda = 1e-3;

    for _ in 0..MAX_LM_ITERS {
        let mut jac = DMatrix::<f64>::zeros(res.len(), 6);
        for k in 0..6 {
            let mut plus = params;
            let mut minus = params;
            plus[k] += JACOBIAN_STEP;
            minus[k] -= JACOBIAN_STEP;
            let d = (residuals(&plus, object, image, camera)
                - residuals(&minus, object, image, camera))
                / (2.0 * JACOBIAN_STEP);
            jac.set_column(k, &d);
        }

        let jtj: SMatrix<f64, 6, 6> = (jac.transpose() * &jac).fixed_view::<6, 6>(0, 0).into_owned();
        let jtr: SVector<f64, 6> = (jac.transpose() * &res).fixed_rows::<6>(0).into_owned();

        let mut improved = false;
        while lambda < 1e12 {
            let mut damped = jtj;
            for i in 0..6 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }
            let Some(step) = damped.lu().solve(&(-jtr)) else {
                lambda *= 10.0;
                continue;
            };

            let candidate = params + step;
            let cand_res = residuals(&candidate, object, image, camera);
            let cand_cost = cand_res.norm_squared();
            if cand_cost.is_finite() && cand_cost < cost {
                let gain = cost - cand_cost;
                params = candidate;
                res = cand_res;
                cost = cand_cost;
                lambda = (lambda / 10.0).max(1e-12);
                improved = gain > 1e-14 * cost.max(1.0) && step.norm() > 1e-12;
                break;
            }
            lambda *= 10.0;
        }

        if !improved {
            break;
        }
    }
    params
}

/// Finds `(rvec, tvec)` such that `x_cam = R(rvec) * X + tvec` projects the
/// planar `object` points onto `image` through `camera`.
///
/// Object points must lie in the `z = 0` plane.
pub fn solve_pnp(
    object: &[Vector3<f64>],
    image: &[Vector2<f64>],
    camera: &CameraCalibration,
) -> Result<(Vector3<f64>, Vector3<f64>)> {
    if object.len() != image.len() {
        return Err(Error::PoseEstimationFailed(format!(
            "{} object points but {} image points",
            object.len(),
            image.len()
        )));
    }
    if object.len() < 4 {
        return Err(Error::PoseEstimationFailed(format!(
            "need at least 4 correspondences, got {}",
            object.len()
        )));
    }
    if object.iter().any(|p| p.z.abs() > 1e-9) {
        return Err(Error::PoseEstimationFailed(
            "object points are not planar (z = 0)".into(),
        ));
    }
    if image.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(Error::PoseEstimationFailed("non-finite image point".into()));
    }

    let plane: Vec<_> = object.iter().map(|p| Vector2::new(p.x, p.y)).collect();
    let normalized: Vec<_> = image.iter().map(|p| camera.undistort_point(*p)).collect();

    let (r0, t0) = plane_homography(&plane, &normalized)
        .and_then(|h| pose_from_homography(&h))
        .ok_or_else(|| Error::PoseEstimationFailed("degenerate point configuration".into()))?;

    let mut init = SVector::<f64, 6>::zeros();
    init.fixed_rows_mut::<3>(0).copy_from(&rotation_vector(&r0));
    init.fixed_rows_mut::<3>(3).copy_from(&t0);

    let solution = refine_lm(init, object, image, camera);
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(Error::PoseEstimationFailed("solver diverged".into()));
    }

    let rvec = solution.fixed_rows::<3>(0).into_owned();
    let tvec = solution.fixed_rows::<3>(3).into_owned();
    let r = rodrigues(&rvec);
    if object.iter().any(|x| (r * x + tvec).z <= 0.0) {
        return Err(Error::PoseEstimationFailed(
            "target is not in front of the camera".into(),
        ));
    }
    Ok((rvec, tvec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unit_square() -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(-0.5, -0.5, 0.0),
            Vector3::new(0.5, -0.5, 0.0),
            Vector3::new(0.5, 0.5, 0.0),
            Vector3::new(-0.5, 0.5, 0.0),
        ]
    }

    fn project_all(
        object: &[Vector3<f64>],
        rvec: &Vector3<f64>,
        tvec: &Vector3<f64>,
        camera: &CameraCalibration,
    ) -> Vec<Vector2<f64>> {
        let r = rodrigues(rvec);
        object.iter().map(|x| camera.project(&(r * x + tvec))).collect()
    }

    #[test]
    fn rodrigues_quarter_turn_about_z() {
        let r = rodrigues(&Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
        let expected = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        assert_abs_diff_eq!(r, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(rodrigues(&Vector3::zeros()), Matrix3::identity(), epsilon = 1e-15);
    }

    #[test]
    fn recovers_synthetic_pose() {
        let camera = CameraCalibration::default();
        let object = unit_square();
        let rvec = Vector3::new(0.3, -0.2, 0.1);
        let tvec = Vector3::new(0.2, -0.1, 4.0);
        let image = project_all(&object, &rvec, &tvec, &camera);

        let (r, t) = solve_pnp(&object, &image, &camera).unwrap();
        assert_abs_diff_eq!(r, rvec, epsilon = 1e-6);
        assert_abs_diff_eq!(t, tvec, epsilon = 1e-6);
    }

    #[test]
    fn recovers_pose_through_distortion() {
        let camera = CameraCalibration::default().with_distortion([-0.15, 0.03, 0.001, 0.0005]);
        let object = unit_square();
        let rvec = Vector3::new(-0.4, 0.25, 1.2);
        let tvec = Vector3::new(-0.3, 0.4, 3.0);
        let image = project_all(&object, &rvec, &tvec, &camera);

        let (r, t) = solve_pnp(&object, &image, &camera).unwrap();
        assert_abs_diff_eq!(r, rvec, epsilon = 1e-5);
        assert_abs_diff_eq!(t, tvec, epsilon = 1e-5);
    }

    #[test]
    fn more_than_four_points() {
        let camera = CameraCalibration::default();
        let mut object = unit_square();
        object.push(Vector3::new(0.0, 0.0, 0.0));
        object.push(Vector3::new(0.25, -0.1, 0.0));
        let rvec = Vector3::new(0.1, 0.5, -0.2);
        let tvec = Vector3::new(0.0, 0.0, 2.5);
        let image = project_all(&object, &rvec, &tvec, &camera);

        let (r, t) = solve_pnp(&object, &image, &camera).unwrap();
        assert_abs_diff_eq!(r, rvec, epsilon = 1e-6);
        assert_abs_diff_eq!(t, tvec, epsilon = 1e-6);
    }

    #[test]
    fn rejects_bad_input() {
        let camera = CameraCalibration::default();
        let object = unit_square();
        let image = vec![Vector2::new(1.0, 1.0); 3];
        assert!(matches!(
            solve_pnp(&object, &image, &camera),
            Err(Error::PoseEstimationFailed(_))
        ));
        assert!(solve_pnp(&object[..3], &image, &camera).is_err());

        let collapsed = vec![Vector2::new(300.0, 200.0); 4];
        assert!(solve_pnp(&object, &collapsed, &camera).is_err());
    }

    #[test]
    fn coincident_corners_give_no_pose() {
        let camera = CameraCalibration::default().with_distortion([-0.1, 0.01, 0.0, 0.0]);
        let object = unit_square();
        for point in [Vector2::new(300.0, 200.0), Vector2::new(camera.cx, camera.cy)] {
            let err = solve_pnp(&object, &[point; 4], &camera).unwrap_err();
            assert!(matches!(err, Error::PoseEstimationFailed(_)), "{err}");
        }

        // Coincident object points are just as degenerate.
        let image = project_all(
            &object,
            &Vector3::new(0.1, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, 3.0),
            &camera,
        );
        let object = vec![Vector3::new(0.2, 0.2, 0.0); 4];
        assert!(solve_pnp(&object, &image, &camera).is_err());
    }

    #[test]
    fn solutions_keep_the_target_in_front() {
        let camera = CameraCalibration::default();
        let object = unit_square();
        let rvec = Vector3::new(-0.5, 0.35, 2.0);
        let tvec = Vector3::new(0.4, 0.3, 1.5);
        let image = project_all(&object, &rvec, &tvec, &camera);

        let (r, t) = solve_pnp(&object, &image, &camera).unwrap();
        let rot = rodrigues(&r);
        for x in &object {
            assert!((rot * x + t).z > 0.0);
        }
        assert_abs_diff_eq!(t, tvec, epsilon = 1e-6);
    }
}
