//! Intrinsic calibration from planar-target correspondences.
//!
//! [`CalibrationSolver::calibrate`] estimates one camera matrix (`fx`, `fy`,
//! `cx`, `cy`, zero skew), one distortion vector and one pose per view,
//! minimising the total squared reprojection error:
//!
//! 1. per-view plane→image homography (normalized DLT);
//! 2. focal lengths from the homographies' orthogonality constraints, with
//!    the principal point at the image centre;
//! 3. per-view pose from homography decomposition;
//! 4. Levenberg-Marquardt over all parameters with Brown-Conrady distortion;
//! 5. optionally, a short Kannala-Brandt (fisheye) pass seeded from step 4.
//!
//! ```no_run
//! use camcal_core::{CorrespondenceSet, ImageSize, PatternSpec};
//! use camcal_solver::{CalibrationSolver, SolverParams};
//!
//! let set = CorrespondenceSet::new(PatternSpec::default());
//! let solver = CalibrationSolver::new(SolverParams::default());
//! match solver.calibrate(&set, ImageSize::new(640, 480)) {
//!     Ok(res) => println!("rms = {:.3}", res.rms),
//!     Err(e) => eprintln!("calibration failed: {e}"),
//! }
//! ```

mod backend;
mod error;
mod init;
mod problem;
mod solver;

pub use backend::{minimize, LmOptions, LmReport, NllsProblem};
pub use error::SolverError;
pub use init::{init_intrinsics, pose_from_homography};
pub use solver::{CalibrationResult, CalibrationSolver, SolverParams};
