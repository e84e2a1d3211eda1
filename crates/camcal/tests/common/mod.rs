#![allow(dead_code)]

use camcal_core::{BrownConrady5, CameraMatrix, Distortion, PatternSpec, ViewPose};
use image::{GrayImage, Luma};
use nalgebra::{Matrix3, Rotation3, Vector2, Vector3};
use std::path::{Path, PathBuf};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;

pub fn truth_camera() -> CameraMatrix {
    CameraMatrix::new(560.0, 560.0, 320.0, 240.0)
}

/// Moderately tilted views of a 6x9 board, one board square per unit.
pub fn poses() -> Vec<ViewPose> {
    let tilts = [
        (0.25, 0.0, 0.0),
        (-0.25, 0.1, 0.05),
        (0.0, 0.25, -0.1),
        (0.1, -0.25, 0.15),
        (-0.2, -0.2, -0.1),
    ];
    let offsets = [
        (0.0, 0.0, 18.0),
        (0.5, -0.3, 18.5),
        (-0.5, 0.3, 17.5),
        (0.3, 0.5, 19.0),
        (-0.3, -0.5, 18.0),
    ];
    board_poses(&tilts, &offsets)
}

/// Closer views pushed towards the left and right image borders, where
/// radial distortion is strongest.
pub fn wide_poses() -> Vec<ViewPose> {
    let tilts = [
        (0.2, 0.1, 0.0),
        (-0.2, -0.1, 0.05),
        (0.1, 0.25, -0.1),
        (-0.1, -0.25, 0.1),
        (0.25, -0.15, 0.0),
        (-0.15, 0.2, -0.05),
    ];
    let offsets = [
        (-2.5, 0.0, 16.0),
        (2.5, 0.0, 16.0),
        (-2.0, -0.5, 16.5),
        (2.0, 0.5, 16.5),
        (0.0, 0.0, 15.5),
        (-2.5, 0.5, 17.0),
    ];
    board_poses(&tilts, &offsets)
}

fn board_poses(tilts: &[(f64, f64, f64)], offsets: &[(f64, f64, f64)]) -> Vec<ViewPose> {
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

/// Barrel lens used for the distorted renders.
pub fn barrel() -> Distortion {
    Distortion::Pinhole(BrownConrady5 {
        k1: -0.25,
        ..BrownConrady5::default()
    })
}

fn no_distortion() -> Distortion {
    Distortion::Pinhole(BrownConrady5::default())
}

/// Board plane to normalised camera coordinates, `[r1 r2 t]`.
fn plane_to_camera(pose: &ViewPose) -> Matrix3<f64> {
    let r = pose.rotation().into_inner();
    let mut rt = Matrix3::zeros();
    rt.set_column(0, &r.column(0));
    rt.set_column(1, &r.column(1));
    rt.set_column(2, &pose.tvec);
    rt
}

/// Invert `dist` by fixed-point iteration on normalised coordinates.
fn undistort(dist: &Distortion, distorted: Vector2<f64>) -> Vector2<f64> {
    let mut n = distorted;
    for _ in 0..20 {
        n += distorted - dist.distort(n);
    }
    n
}

/// Render the 6x9 board seen from `pose` through the undistorted truth
/// camera, 4x4 supersampled.
pub fn render_view(pose: &ViewPose) -> GrayImage {
    render_view_with(pose, &no_distortion())
}

/// Render through the truth camera with lens `dist`: every sample ray is
/// undistorted and intersected with the board plane.
pub fn render_view_with(pose: &ViewPose, dist: &Distortion) -> GrayImage {
    let pattern = PatternSpec::default();
    let k = truth_camera();
    let inv = plane_to_camera(pose)
        .try_inverse()
        .expect("board plane not through the camera centre");
    let ss = 4;
    GrayImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let mut acc = 0u32;
        for sy in 0..ss {
            for sx in 0..ss {
                let px = x as f64 + (sx as f64 + 0.5) / ss as f64 - 0.5;
                let py = y as f64 + (sy as f64 + 0.5) / ss as f64 - 0.5;
                let n = undistort(dist, Vector2::new((px - k.cx) / k.fx, (py - k.cy) / k.fy));
                let v = inv * Vector3::new(n.x, n.y, 1.0);
                let (bx, by) = (v.x / v.z, v.y / v.z);
                let inside = bx >= -1.0
                    && by >= -1.0
                    && bx < pattern.width as f64
                    && by < pattern.height as f64;
                let black = inside && (bx.floor() as i64 + by.floor() as i64).rem_euclid(2) == 0;
                if !black {
                    acc += 1;
                }
            }
        }
        Luma([(20.0 + 215.0 * acc as f64 / (ss * ss) as f64).round() as u8])
    })
}

pub fn blank_frame() -> GrayImage {
    GrayImage::from_pixel(WIDTH, HEIGHT, Luma([128]))
}

/// Write one PNG per pose as `view_00.png`, ... and, when `with_blank`, a
/// featureless `zz_blank.png` that sorts last.
pub fn write_dataset(dir: &Path, with_blank: bool) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for (i, pose) in poses().iter().enumerate() {
        let path = dir.join(format!("view_{i:02}.png"));
        render_view(pose).save(&path).expect("write view");
        paths.push(path);
    }
    if with_blank {
        let path = dir.join("zz_blank.png");
        blank_frame().save(&path).expect("write blank");
        paths.push(path);
    }
    paths
}

/// Write one barrel-distorted view per [`wide_poses`] entry.
pub fn write_distorted_dataset(dir: &Path) -> Vec<PathBuf> {
    let dist = barrel();
    wide_poses()
        .iter()
        .enumerate()
        .map(|(i, pose)| {
            let path = dir.join(format!("wide_{i:02}.png"));
            render_view_with(pose, &dist).save(&path).expect("write view");
            path
        })
        .collect()
}
