use crate::init::{init_intrinsics, pose_from_homography};
use crate::backend::{minimize, LmOptions};
use crate::problem::{ReprojectionProblem, ViewData};
use crate::SolverError;
use camcal_core::{
    estimate_homography, BrownConrady5, CameraMatrix, CorrespondenceSet, Distortion,
    DistortionKind, ImageSize, KannalaBrandt4, ViewCorrespondence, ViewPose,
};
use nalgebra::{DVector, Point2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Solver settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SolverParams {
    pub max_iters: usize,
    pub tolerance: f64,
    /// Fewer accepted views than this is an error.
    pub min_views: usize,
    /// Run a Kannala-Brandt refinement after the pinhole pass and report it.
    pub fisheye: bool,
    pub fisheye_max_iters: usize,
    pub fisheye_tolerance: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            max_iters: 30,
            tolerance: 1e-12,
            min_views: 3,
            fisheye: false,
            fisheye_max_iters: 3,
            fisheye_tolerance: 1e-6,
        }
    }
}

/// Camera model fitted to all accepted views.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationResult {
    pub camera_matrix: CameraMatrix,
    pub distortion: Distortion,
    /// One board→camera pose per view, in correspondence order.
    pub poses: Vec<ViewPose>,
    /// Root-mean-square reprojection error in pixels.
    pub rms: f64,
    pub iterations: usize,
    pub image_size: ImageSize,
}

impl CalibrationResult {
    pub fn model(&self) -> DistortionKind {
        self.distortion.kind()
    }

    pub fn dist_coefs(&self) -> Vec<f64> {
        self.distortion.coefficients()
    }

    pub fn rvecs(&self) -> Vec<Vector3<f64>> {
        self.poses.iter().map(|p| p.rvec).collect()
    }

    pub fn tvecs(&self) -> Vec<Vector3<f64>> {
        self.poses.iter().map(|p| p.tvec).collect()
    }

    pub fn num_views(&self) -> usize {
        self.poses.len()
    }
}

/// Planar-target intrinsic calibration.
#[derive(Clone, Debug, Default)]
pub struct CalibrationSolver {
    params: SolverParams,
}

impl CalibrationSolver {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Fit intrinsics, distortion and per-view poses to `set`.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, set), fields(views = set.len())))]
    pub fn calibrate(
        &self,
        set: &CorrespondenceSet,
        image_size: ImageSize,
    ) -> Result<CalibrationResult, SolverError> {
        self.calibrate_views(set.views(), image_size)
    }

    /// Same as [`calibrate`](Self::calibrate) for views that do not come from
    /// a [`CorrespondenceSet`].
    pub fn calibrate_views(
        &self,
        views: &[ViewCorrespondence],
        image_size: ImageSize,
    ) -> Result<CalibrationResult, SolverError> {
        if image_size.is_empty() {
            return Err(SolverError::EmptyImageSize {
                width: image_size.width,
                height: image_size.height,
            });
        }
        if views.len() < self.params.min_views.max(1) {
            return Err(SolverError::TooFewViews {
                got: views.len(),
                min: self.params.min_views.max(1),
            });
        }

        let data = views
            .iter()
            .enumerate()
            .map(|(i, v)| to_view_data(i, v))
            .collect::<Result<Vec<_>, _>>()?;

        let homographies = data
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let plane: Vec<Point2<f64>> = v.object.iter().map(|p| Point2::new(p.x, p.y)).collect();
                estimate_homography(&plane, &v.image)
                    .map(|h| h.h)
                    .ok_or_else(|| SolverError::Degenerate(format!("view {i}: homography estimation failed")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let k0 = init_intrinsics(&homographies, image_size)?;
        let poses0 = homographies
            .iter()
            .map(|h| pose_from_homography(&k0, h))
            .collect::<Result<Vec<_>, _>>()?;

        let pinhole = ReprojectionProblem::new(data, DistortionKind::Pinhole);
        let x0 = pinhole.pack(&k0, &Distortion::Pinhole(BrownConrady5::default()), &poses0);
        let opts = LmOptions {
            max_iters: self.params.max_iters,
            tolerance: self.params.tolerance,
        };
        let (x, report) = minimize(&pinhole, x0, &opts)?;
        let mut result = build_result(&pinhole, &x, report.iterations, image_size)?;
        log::info!(
            "pinhole calibration: rms={:.4} px after {} iterations (converged: {})",
            result.rms,
            report.iterations,
            report.converged
        );

        if self.params.fisheye {
            let fisheye = ReprojectionProblem::new(pinhole.into_views(), DistortionKind::Fisheye);
            let x0 = fisheye.pack(
                &result.camera_matrix,
                &Distortion::Fisheye(KannalaBrandt4::default()),
                &result.poses,
            );
            let opts = LmOptions {
                max_iters: self.params.fisheye_max_iters,
                tolerance: self.params.fisheye_tolerance,
            };
            let (x, report) = minimize(&fisheye, x0, &opts)?;
            result = build_result(&fisheye, &x, report.iterations, image_size)?;
            log::info!(
                "fisheye refinement: rms={:.4} px after {} iterations",
                result.rms,
                report.iterations
            );
        }

        Ok(result)
    }
}

fn to_view_data(index: usize, view: &ViewCorrespondence) -> Result<ViewData, SolverError> {
    let object = view.object_points.len();
    let image = view.image_points.len();
    if object != image {
        return Err(SolverError::LengthMismatch {
            view: index,
            object,
            image,
        });
    }
    if image < 4 {
        return Err(SolverError::TooFewPoints {
            view: index,
            got: image,
        });
    }
    Ok(ViewData {
        object: view.object_points.iter().map(|p| p.cast::<f64>()).collect(),
        image: view.image_points.iter().map(|p| p.cast::<f64>()).collect(),
    })
}

fn build_result(
    problem: &ReprojectionProblem,
    x: &DVector<f64>,
    iterations: usize,
    image_size: ImageSize,
) -> Result<CalibrationResult, SolverError> {
    let (camera_matrix, distortion, poses) = problem.unpack(x);
    if !camera_matrix.is_finite() || camera_matrix.fx <= 0.0 || camera_matrix.fy <= 0.0 {
        return Err(SolverError::NonFinite);
    }

    let total: f64 = problem.squared_errors(x).iter().flatten().sum();
    let rms = (total / problem.total_points().max(1) as f64).sqrt();
    if !rms.is_finite() {
        return Err(SolverError::NonFinite);
    }

    Ok(CalibrationResult {
        camera_matrix,
        distortion,
        poses,
        rms,
        iterations,
        image_size,
    })
}
