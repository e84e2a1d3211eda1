//! Closed-form initial guess: focal lengths from homography orthogonality
//! constraints and per-view poses from homography decomposition.

use crate::SolverError;
use camcal_core::{CameraMatrix, ImageSize, ViewPose};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

const MIN_FOCAL_CONDITION: f64 = 1e-4;

/// Focal lengths from the plane→image homographies of all views, with the
/// principal point fixed at the image centre.
///
/// Each view contributes two equations in `(1/fx², 1/fy²)`: orthogonality of
/// the first two rotation columns and equality of their norms (written as
/// orthogonality of their sum and difference).
pub fn init_intrinsics(
    homographies: &[Matrix3<f64>],
    image_size: ImageSize,
) -> Result<CameraMatrix, SolverError> {
    let cx = (image_size.width as f64 - 1.0) * 0.5;
    let cy = (image_size.height as f64 - 1.0) * 0.5;

    let n = homographies.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 2);
    let mut b = DVector::<f64>::zeros(2 * n);

    for (i, hmtx) in homographies.iter().enumerate() {
        let mut h = *hmtx;
        for j in 0..3 {
            h[(0, j)] -= cx * h[(2, j)];
            h[(1, j)] -= cy * h[(2, j)];
        }
        let c0: Vector3<f64> = h.column(0).into_owned();
        let c1: Vector3<f64> = h.column(1).into_owned();

        let d1 = ((c0 + c1) * 0.5).normalize();
        let d2 = ((c0 - c1) * 0.5).normalize();
        let c0 = c0.normalize();
        let c1 = c1.normalize();

        a[(2 * i, 0)] = c0.x * c1.x;
        a[(2 * i, 1)] = c0.y * c1.y;
        b[2 * i] = -c0.z * c1.z;
        a[(2 * i + 1, 0)] = d1.x * d2.x;
        a[(2 * i + 1, 1)] = d1.y * d2.y;
        b[2 * i + 1] = -d1.z * d2.z;
    }

    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(SolverError::Degenerate(
            "homography columns vanish after centring".into(),
        ));
    }

    // Views without perspective tilt only constrain fx/fy up to a common
    // scale; the system is then (numerically) rank one.
    let svd = a.svd(true, true);
    let sv_max = svd.singular_values.max();
    let sv_min = svd.singular_values.min();
    if sv_max <= 0.0 || sv_min / sv_max < MIN_FOCAL_CONDITION {
        return Err(SolverError::Degenerate(
            "views do not constrain the focal lengths; add tilted views".into(),
        ));
    }
    let f = svd
        .solve(&b, 0.0)
        .map_err(|e| SolverError::Degenerate(format!("focal least squares failed: {e}")))?;

    // The unknowns are 1/fx² and 1/fy²; a non-positive solution means the
    // views are mutually inconsistent.
    if !(f[0] > 0.0 && f[1] > 0.0) {
        return Err(SolverError::Degenerate(format!(
            "inconsistent views: 1/fx²={:.3e}, 1/fy²={:.3e}",
            f[0], f[1]
        )));
    }
    let fx = (1.0 / f[0]).sqrt();
    let fy = (1.0 / f[1]).sqrt();
    if !fx.is_finite() || !fy.is_finite() || fx <= 0.0 || fy <= 0.0 {
        return Err(SolverError::Degenerate(format!(
            "focal length estimate is not finite (fx={fx}, fy={fy})"
        )));
    }

    log::debug!("initial intrinsics fx={fx:.2} fy={fy:.2} cx={cx:.2} cy={cy:.2}");
    Ok(CameraMatrix::new(fx, fy, cx, cy))
}

/// Board→camera pose from a plane→image homography and intrinsics, assuming
/// the board lies on `z = 0`.
///
/// The rotation is projected onto SO(3); the translation is scaled so the
/// first two rotation columns have unit norm on average.
pub fn pose_from_homography(k: &CameraMatrix, hmtx: &Matrix3<f64>) -> Result<ViewPose, SolverError> {
    let degenerate = || SolverError::Degenerate("homography cannot be decomposed into a pose".into());

    let k_inv = k.to_matrix().try_inverse().ok_or_else(degenerate)?;
    let k_inv_h1 = k_inv * hmtx.column(0);
    let k_inv_h2 = k_inv * hmtx.column(1);

    let denom = 0.5 * (k_inv_h1.norm() + k_inv_h2.norm());
    if !denom.is_finite() || denom <= 1e-12 {
        return Err(degenerate());
    }
    let lambda = 1.0 / denom;

    let mut r1: Vector3<f64> = k_inv_h1 * lambda;
    let mut r2: Vector3<f64> = k_inv_h2 * lambda;
    let mut t: Vector3<f64> = k_inv * hmtx.column(2) * lambda;
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    let r3 = r1.cross(&r2);
    if r3.norm() <= 1e-12 {
        return Err(degenerate());
    }

    let r = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(degenerate());
    };
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let rot = nalgebra::Rotation3::from_matrix_unchecked(r_orth);
    Ok(ViewPose::from_rotation(&rot, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn homography(k: &CameraMatrix, pose: &ViewPose) -> Matrix3<f64> {
        let r = pose.rotation().into_inner();
        let m = Matrix3::from_columns(&[
            r.column(0).into_owned(),
            r.column(1).into_owned(),
            pose.tvec,
        ]);
        let h = k.to_matrix() * m;
        h / h[(2, 2)]
    }

    fn tilted_poses() -> Vec<ViewPose> {
        vec![
            ViewPose::new(Vector3::new(0.3, 0.0, 0.0), Vector3::new(-2.0, -3.0, 12.0)),
            ViewPose::new(Vector3::new(0.0, -0.35, 0.1), Vector3::new(-3.0, -2.0, 14.0)),
            ViewPose::new(Vector3::new(-0.2, 0.25, -0.1), Vector3::new(-2.5, -4.0, 13.0)),
        ]
    }

    #[test]
    fn focal_lengths_from_exact_homographies() {
        let k = CameraMatrix::new(820.0, 800.0, 319.5, 239.5);
        let hs: Vec<_> = tilted_poses().iter().map(|p| homography(&k, p)).collect();
        let est = init_intrinsics(&hs, ImageSize::new(640, 480)).unwrap();
        assert_relative_eq!(est.fx, 820.0, max_relative = 1e-6);
        assert_relative_eq!(est.fy, 800.0, max_relative = 1e-6);
        assert_relative_eq!(est.cx, 319.5);
        assert_relative_eq!(est.cy, 239.5);
    }

    #[test]
    fn fronto_parallel_views_are_degenerate() {
        let k = CameraMatrix::new(800.0, 800.0, 319.5, 239.5);
        let hs: Vec<_> = [0.0, 0.4, -0.7]
            .iter()
            .map(|&a| homography(&k, &ViewPose::new(Vector3::new(0.0, 0.0, a), Vector3::new(-2.0, -3.0, 12.0))))
            .collect();
        assert!(matches!(
            init_intrinsics(&hs, ImageSize::new(640, 480)),
            Err(SolverError::Degenerate(_))
        ));
    }

    #[test]
    fn negative_inverse_focal_is_degenerate() {
        // Centred columns (1, .5, 1) and (.5, 1, 1) solve to 1/f² = -1 on both axes.
        let h = Matrix3::new(1.0, 0.5, 0.0, 0.5, 1.0, 0.0, 1.0, 1.0, 1.0);
        let res = init_intrinsics(&[h], ImageSize::new(1, 1));
        assert!(matches!(res, Err(SolverError::Degenerate(_))), "{res:?}");
    }

    #[test]
    fn pose_recovered_from_homography() {
        let k = CameraMatrix::new(820.0, 800.0, 319.5, 239.5);
        for pose in tilted_poses() {
            let est = pose_from_homography(&k, &homography(&k, &pose)).unwrap();
            assert_relative_eq!(est.rvec, pose.rvec, epsilon = 1e-9);
            assert_relative_eq!(est.tvec, pose.tvec, epsilon = 1e-8);
        }
    }
}
