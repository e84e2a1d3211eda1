//! Core types and utilities for checkerboard camera calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector, image decoder or solver.
//!
//! ## API map
//! - [`PatternSpec`]: interior-corner counts and the canonical object grid.
//! - [`CorrespondenceSet`]: accepted per-view (object, image) point pairs.
//! - [`CameraMatrix`], [`Distortion`], [`project_point`]: pinhole and fisheye
//!   projection used by the solver and by synthetic test data.
//! - [`Homography`], [`estimate_homography`]: normalized DLT.
//! - [`GrayImageView`], [`sample_bilinear`]: lightweight image access.

mod camera;
mod correspondence;
mod grid_alignment;
mod homography;
mod image;
mod logger;
mod pattern;

pub use camera::{
    project_point, BrownConrady5, CameraMatrix, Distortion, DistortionKind, KannalaBrandt4,
    ViewPose,
};
pub use correspondence::{CorrespondenceError, CorrespondenceSet, ImageSize, ViewCorrespondence};
pub use grid_alignment::{GridTransform, GRID_TRANSFORMS_D4};
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, GrayImageView};
pub use pattern::{PatternError, PatternSpec};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
