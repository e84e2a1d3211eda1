//! Camera intrinsic calibration from views of a planar checkerboard.
//!
//! This crate ties the workspace together:
//! - [`FrameSource`]: image directories, animated GIFs, and video files or
//!   capture devices (through an `ffmpeg` child process);
//! - [`Session`]: detection over a source, view accumulation, calibration
//!   and the report, driven by a [`SessionConfig`];
//! - the correspondence cache ([`save_correspondences`] /
//!   [`load_correspondences`]) and the report writer ([`write_report`]).
//!
//! ## Quickstart
//!
//! ```no_run
//! use camcal::{ProgressEvent, Session, SessionConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::new(SessionConfig::default())?;
//! let result = session.run(Path::new("frames/"), Path::new("calib.json"), |ev| {
//!     if let ProgressEvent::FrameSearched { index, found } = ev {
//!         println!("frame {index}: {found}");
//!     }
//! })?;
//! println!("rms = {:.3}", result.rms);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `camcal::core`: pattern grid, correspondences, camera models.
//! - `camcal::chessboard`: checkerboard detection and debug overlays.
//! - `camcal::solver`: intrinsic calibration.

pub use camcal_chessboard as chessboard;
pub use camcal_core as core;
pub use camcal_solver as solver;

mod accumulator;
mod cache;
mod config;
mod error;
mod report;
mod session;
mod source;

pub use accumulator::{AccumulatorError, CorrespondenceAccumulator};
pub use cache::{load_correspondences, save_correspondences, CacheError};
pub use config::{SessionConfig, SourceOptions};
pub use error::SessionError;
pub use report::{write_report, CalibrationReport, ReportError};
pub use session::{ProgressEvent, Session};
pub use source::{
    fit_to_size, list_images, load_gray, FfmpegReader, Frame, FrameReader, FrameSource,
    GifReader, SourceError, IMAGE_EXTENSIONS,
};

pub use camcal_chessboard::{DetectionResult, DetectorParams, PatternDetector};
pub use camcal_core::{CorrespondenceSet, ImageSize, PatternSpec};
pub use camcal_solver::{CalibrationResult, CalibrationSolver, SolverParams};
