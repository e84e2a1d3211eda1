//! Checkerboard detector for camera calibration.
//!
//! ## Quickstart
//!
//! ```
//! use camcal_chessboard::PatternDetector;
//! use camcal_core::PatternSpec;
//!
//! let img = image::GrayImage::new(64, 48);
//! let result = PatternDetector::default().detect(&img, &PatternSpec::default());
//! println!("found: {}", result.found);
//! ```
//!
//! Pipeline:
//! 1. ChESS X-junction candidates (`chess-corners`).
//! 2. Seed near the candidate centroid; estimate two local step vectors from
//!    its nearest neighbours.
//! 3. Grow an integer lattice breadth-first, snapping predicted positions to
//!    the nearest unused candidate.
//! 4. Accept only a complete lattice of the expected size (either orientation).
//! 5. Pick a right-handed row-major ordering starting at the corner nearest the
//!    image origin.
//! 6. Refine every corner to subpixel accuracy.

mod chess;
mod detector;
mod grid;
mod layout;
mod overlay;
mod params;
mod subpix;

pub use chess::{chess_config, detect_candidates, Candidate};
pub use detector::{
    ChessboardFinder, CornerFinder, CornerRefiner, DetectionResult, PatternDetector,
    PatternSearch,
};
pub use grid::{find_lattice, Lattice};
pub use layout::order_corners;
pub use overlay::{render_overlay, write_overlay};
pub use params::{CandidateParams, DetectorParams, GridSearchParams, SubpixParams};
pub use subpix::SubpixRefiner;
