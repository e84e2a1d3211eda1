use approx::assert_relative_eq;
use camcal_core::{
    project_point, BrownConrady5, CameraMatrix, CorrespondenceSet, Distortion, DistortionKind,
    ImageSize, KannalaBrandt4, PatternSpec, ViewPose,
};
use camcal_solver::{CalibrationSolver, SolverError, SolverParams};
use nalgebra::{Point2, Point3, Rotation3, Vector2, Vector3};

fn truth_camera() -> CameraMatrix {
    CameraMatrix::new(820.0, 805.0, 322.0, 236.0)
}

/// Board poses looking at a 6x9 board (centre at (2.5, 4, 0)) from varied tilts.
fn poses() -> Vec<ViewPose> {
    let tilts = [
        (0.35, 0.0, 0.0),
        (-0.3, 0.1, 0.05),
        (0.0, 0.4, -0.1),
        (0.1, -0.35, 0.2),
        (-0.25, -0.25, -0.15),
        (0.2, 0.3, 0.3),
    ];
    let offsets = [
        (0.0, 0.0, 14.0),
        (1.0, -0.5, 15.0),
        (-1.0, 0.5, 13.0),
        (0.5, 1.0, 16.0),
        (-0.5, -1.0, 14.5),
        (0.0, 0.8, 15.5),
    ];
    let centre = Vector3::new(2.5, 4.0, 0.0);
    tilts
        .iter()
        .zip(offsets.iter())
        .map(|(&(rx, ry, rz), &(dx, dy, dz))| {
            let rot = Rotation3::new(Vector3::new(rx, ry, rz));
            let t = Vector3::new(dx, dy, dz) - rot * centre;
            ViewPose::from_rotation(&rot, t)
        })
        .collect()
}

/// Deterministic pseudo-noise in [-amp, amp].
fn jitter(seed: usize, amp: f64) -> f64 {
    let v = ((seed as f64 * 12.9898).sin() * 43758.5453).fract();
    (2.0 * v.abs() - 1.0) * amp
}

fn synthetic_set(dist: &Distortion, noise: f64, views: usize) -> CorrespondenceSet {
    let pattern = PatternSpec::default();
    let k = truth_camera();
    let mut set = CorrespondenceSet::new(pattern);
    for (v, pose) in poses().iter().take(views).enumerate() {
        let pts: Vec<Point2<f32>> = pattern
            .object_points()
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let uv = project_point(&k, dist, pose, &p.cast::<f64>());
                let s = v * 1000 + i * 2;
                Point2::new(
                    (uv.x + jitter(s, noise)) as f32,
                    (uv.y + jitter(s + 1, noise)) as f32,
                )
            })
            .collect();
        set.push_image_points(pts).unwrap();
    }
    set
}

#[test]
fn recovers_pinhole_intrinsics_and_distortion() {
    let dist = Distortion::Pinhole(BrownConrady5 {
        k1: -0.15,
        k2: 0.05,
        p1: 0.001,
        p2: -0.0008,
        k3: 0.0,
    });
    let set = synthetic_set(&dist, 0.1, 6);
    let res = CalibrationSolver::default()
        .calibrate(&set, ImageSize::new(640, 480))
        .unwrap();

    assert!(res.rms < 0.5, "rms {}", res.rms);
    assert_eq!(res.model(), DistortionKind::Pinhole);
    assert_eq!(res.dist_coefs().len(), 5);
    assert_eq!(res.num_views(), 6);

    let k = truth_camera();
    assert_relative_eq!(res.camera_matrix.fx, k.fx, max_relative = 0.02);
    assert_relative_eq!(res.camera_matrix.fy, k.fy, max_relative = 0.02);
    assert!((res.camera_matrix.cx - k.cx).abs() < 8.0);
    assert!((res.camera_matrix.cy - k.cy).abs() < 8.0);

    // Coefficients trade off against each other; compare the distortion
    // they produce inside the observed field of view instead.
    for n in [Vector2::new(0.2, 0.15), Vector2::new(-0.25, 0.1), Vector2::new(0.05, -0.3)] {
        let want = k.to_pixel(dist.distort(n));
        let got = res.camera_matrix.to_pixel(res.distortion.distort(n));
        assert!((got - want).norm() < 1.5, "n={n:?}: got {got:?}, want {want:?}");
    }
}

#[test]
fn noiseless_views_give_near_zero_rms() {
    let set = synthetic_set(&Distortion::Pinhole(BrownConrady5::default()), 0.0, 4);
    let res = CalibrationSolver::default()
        .calibrate(&set, ImageSize::new(640, 480))
        .unwrap();
    // f32 storage of the image points bounds the achievable residual.
    assert!(res.rms < 1e-3, "rms {}", res.rms);
    assert_relative_eq!(res.camera_matrix.fx, 820.0, max_relative = 1e-3);
}

#[test]
fn fisheye_pass_reports_kannala_brandt() {
    let dist = Distortion::Fisheye(KannalaBrandt4::default());
    let set = synthetic_set(&dist, 0.0, 6);
    let solver = CalibrationSolver::new(SolverParams {
        fisheye: true,
        ..SolverParams::default()
    });
    let res = solver.calibrate(&set, ImageSize::new(640, 480)).unwrap();
    assert_eq!(res.model(), DistortionKind::Fisheye);
    assert_eq!(res.dist_coefs().len(), 4);
    assert!(res.iterations <= 3);
    assert!(res.rms.is_finite());
    assert!(res.rms < 1.0, "rms {}", res.rms);
}

#[test]
fn too_few_views_is_an_error() {
    let set = synthetic_set(&Distortion::Pinhole(BrownConrady5::default()), 0.0, 2);
    let err = CalibrationSolver::default()
        .calibrate(&set, ImageSize::new(640, 480))
        .unwrap_err();
    assert_eq!(err, SolverError::TooFewViews { got: 2, min: 3 });
}

#[test]
fn empty_image_size_is_an_error() {
    let set = synthetic_set(&Distortion::Pinhole(BrownConrady5::default()), 0.0, 3);
    let err = CalibrationSolver::default()
        .calibrate(&set, ImageSize::new(0, 480))
        .unwrap_err();
    assert!(matches!(err, SolverError::EmptyImageSize { .. }));
}

#[test]
fn fronto_parallel_views_are_degenerate() {
    let pattern = PatternSpec::default();
    let k = truth_camera();
    let dist = Distortion::Pinhole(BrownConrady5::default());
    let mut set = CorrespondenceSet::new(pattern);
    for (i, angle) in [0.0f64, 0.3, -0.5].iter().enumerate() {
        let pose = ViewPose::new(
            Vector3::new(0.0, 0.0, *angle),
            Vector3::new(-2.0 + i as f64 * 0.3, -3.0, 14.0),
        );
        let pts = pattern
            .object_points()
            .iter()
            .map(|p| {
                let uv = project_point(&k, &dist, &pose, &Point3::new(p.x as f64, p.y as f64, 0.0));
                Point2::new(uv.x as f32, uv.y as f32)
            })
            .collect();
        set.push_image_points(pts).unwrap();
    }
    let err = CalibrationSolver::default()
        .calibrate(&set, ImageSize::new(640, 480))
        .unwrap_err();
    assert!(matches!(err, SolverError::Degenerate(_)), "{err:?}");
}
