//! Joint reprojection problem over shared intrinsics and per-view poses.
//!
//! Parameter layout: `[fx, fy, cx, cy, d_0 .. d_{n-1}]` followed by
//! `[rx, ry, rz, tx, ty, tz]` for every view, where `n` is 5 for the
//! Brown-Conrady model and 4 for Kannala-Brandt.

use crate::backend::NllsProblem;
use camcal_core::{
    project_point, BrownConrady5, CameraMatrix, Distortion, DistortionKind, KannalaBrandt4,
    ViewPose,
};
use nalgebra::{DMatrix, DVector, Point2, Point3, Vector3};

const POSE_LEN: usize = 6;

#[derive(Clone, Debug)]
pub(crate) struct ViewData {
    pub object: Vec<Point3<f64>>,
    pub image: Vec<Point2<f64>>,
}

#[derive(Clone, Debug)]
pub(crate) struct ReprojectionProblem {
    views: Vec<ViewData>,
    kind: DistortionKind,
}

fn distortion_len(kind: DistortionKind) -> usize {
    match kind {
        DistortionKind::Pinhole => 5,
        DistortionKind::Fisheye => 4,
    }
}

fn distortion_from(kind: DistortionKind, c: &[f64]) -> Distortion {
    match kind {
        DistortionKind::Pinhole => {
            Distortion::Pinhole(BrownConrady5::from_slice(&[c[0], c[1], c[2], c[3], c[4]]))
        }
        DistortionKind::Fisheye => {
            Distortion::Fisheye(KannalaBrandt4::from_slice(&[c[0], c[1], c[2], c[3]]))
        }
    }
}

fn pose_from(p: &[f64]) -> ViewPose {
    ViewPose::new(
        Vector3::new(p[0], p[1], p[2]),
        Vector3::new(p[3], p[4], p[5]),
    )
}

/// Finite-difference step for a parameter of magnitude `v`.
#[inline]
fn step_for(v: f64) -> f64 {
    1e-6 * v.abs().max(1.0)
}

impl ReprojectionProblem {
    pub fn new(views: Vec<ViewData>, kind: DistortionKind) -> Self {
        Self { views, kind }
    }

    pub fn into_views(self) -> Vec<ViewData> {
        self.views
    }

    pub fn total_points(&self) -> usize {
        self.views.iter().map(|v| v.object.len()).sum()
    }

    fn intrinsics_len(&self) -> usize {
        4 + distortion_len(self.kind)
    }

    pub fn pack(&self, k: &CameraMatrix, dist: &Distortion, poses: &[ViewPose]) -> DVector<f64> {
        let ni = self.intrinsics_len();
        let mut x = DVector::zeros(ni + POSE_LEN * poses.len());
        x[0] = k.fx;
        x[1] = k.fy;
        x[2] = k.cx;
        x[3] = k.cy;
        for (i, c) in dist.coefficients().iter().take(ni - 4).enumerate() {
            x[4 + i] = *c;
        }
        for (v, pose) in poses.iter().enumerate() {
            let base = ni + POSE_LEN * v;
            for a in 0..3 {
                x[base + a] = pose.rvec[a];
                x[base + 3 + a] = pose.tvec[a];
            }
        }
        x
    }

    pub fn unpack(&self, x: &DVector<f64>) -> (CameraMatrix, Distortion, Vec<ViewPose>) {
        let ni = self.intrinsics_len();
        let (k, dist) = self.intrinsics(&x.as_slice()[..ni]);
        let poses = (0..self.views.len())
            .map(|v| pose_from(&x.as_slice()[ni + POSE_LEN * v..ni + POSE_LEN * (v + 1)]))
            .collect();
        (k, dist, poses)
    }

    fn intrinsics(&self, p: &[f64]) -> (CameraMatrix, Distortion) {
        (
            CameraMatrix::new(p[0], p[1], p[2], p[3]),
            distortion_from(self.kind, &p[4..]),
        )
    }

    /// Residuals of view `v` for a local parameter block `[intrinsics, pose]`.
    fn view_residuals(&self, v: usize, local: &[f64], out: &mut Vec<f64>) {
        let ni = self.intrinsics_len();
        let (k, dist) = self.intrinsics(&local[..ni]);
        let pose = pose_from(&local[ni..]);
        let view = &self.views[v];

        out.clear();
        for (obj, img) in view.object.iter().zip(view.image.iter()) {
            let p = project_point(&k, &dist, &pose, obj);
            out.push(p.x - img.x);
            out.push(p.y - img.y);
        }
    }

    fn local_block(&self, x: &DVector<f64>, v: usize) -> Vec<f64> {
        let ni = self.intrinsics_len();
        let base = ni + POSE_LEN * v;
        x.as_slice()[..ni]
            .iter()
            .chain(x.as_slice()[base..base + POSE_LEN].iter())
            .copied()
            .collect()
    }

    /// Squared reprojection distance per point, view by view.
    pub fn squared_errors(&self, x: &DVector<f64>) -> Vec<Vec<f64>> {
        let mut r = Vec::new();
        (0..self.views.len())
            .map(|v| {
                self.view_residuals(v, &self.local_block(x, v), &mut r);
                r.chunks_exact(2).map(|c| c[0] * c[0] + c[1] * c[1]).collect()
            })
            .collect()
    }
}

impl NllsProblem for ReprojectionProblem {
    /// Stacked `(du, dv)` reprojection residuals, view by view.
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut all = Vec::with_capacity(2 * self.total_points());
        let mut r = Vec::new();
        for v in 0..self.views.len() {
            self.view_residuals(v, &self.local_block(x, v), &mut r);
            all.extend_from_slice(&r);
        }
        DVector::from_vec(all)
    }

    /// Central-difference Jacobian, filled view by view: a pose block only
    /// touches its own view's rows.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let ni = self.intrinsics_len();
        let m = ni + POSE_LEN;
        let mut jac = DMatrix::<f64>::zeros(2 * self.total_points(), x.len());

        let mut rp = Vec::new();
        let mut rm = Vec::new();
        let mut row0 = 0;

        for v in 0..self.views.len() {
            let mut local = self.local_block(x, v);
            let rows = 2 * self.views[v].object.len();
            for c in 0..m {
                let orig = local[c];
                let h = step_for(orig);
                local[c] = orig + h;
                self.view_residuals(v, &local, &mut rp);
                local[c] = orig - h;
                self.view_residuals(v, &local, &mut rm);
                local[c] = orig;

                let col = if c < ni { c } else { ni + POSE_LEN * v + (c - ni) };
                for row in 0..rows {
                    jac[(row0 + row, col)] = (rp[row] - rm[row]) / (2.0 * h);
                }
            }
            row0 += rows;
        }
        jac
    }
}
