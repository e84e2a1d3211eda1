use crate::chess::detect_candidates;
use crate::grid::find_lattice;
use crate::layout::order_corners;
use crate::params::{CandidateParams, DetectorParams, GridSearchParams};
use crate::subpix::SubpixRefiner;
use camcal_core::{GrayImageView, PatternSpec};
use image::GrayImage;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of a pattern search in one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatternSearch {
    /// Ordered interior corners, present only for a complete board.
    pub corners: Option<Vec<Point2<f32>>>,
    /// Every X-junction candidate considered, for diagnostics.
    pub candidates: Vec<Point2<f32>>,
}

/// Locates the full set of interior corners of a checkerboard.
pub trait CornerFinder {
    fn find(&self, img: &GrayImage, pattern: &PatternSpec) -> PatternSearch;
}

/// Moves approximate corners to their subpixel positions.
pub trait CornerRefiner {
    fn refine(&self, img: &GrayImage, corners: &mut [Point2<f32>]);
}

/// ChESS candidates, lattice growth and canonical ordering.
#[derive(Clone, Debug, Default)]
pub struct ChessboardFinder {
    pub candidates: CandidateParams,
    pub grid: GridSearchParams,
}

impl CornerFinder for ChessboardFinder {
    fn find(&self, img: &GrayImage, pattern: &PatternSpec) -> PatternSearch {
        let candidates: Vec<Point2<f32>> = detect_candidates(img, &self.candidates)
            .into_iter()
            .map(|c| c.position)
            .collect();

        let expected = (pattern.width as usize, pattern.height as usize);
        let corners = find_lattice(&candidates, expected, &self.grid)
            .and_then(|lattice| order_corners(&lattice, &candidates, pattern));

        PatternSearch {
            corners,
            candidates,
        }
    }
}

impl CornerRefiner for SubpixRefiner {
    fn refine(&self, img: &GrayImage, corners: &mut [Point2<f32>]) {
        let (w, h) = img.dimensions();
        let Some(view) = GrayImageView::new(w as usize, h as usize, img.as_raw()) else {
            return;
        };
        self.refine_all(&view, corners);
    }
}

/// Result of [`PatternDetector::detect`].
///
/// When `found` is true, `corners` holds exactly `pattern.corner_count()`
/// refined points in row-major board order; otherwise it is empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    pub found: bool,
    pub corners: Vec<Point2<f32>>,
    pub candidates: Vec<Point2<f32>>,
}

/// Checkerboard detector: corner search followed by subpixel refinement.
#[derive(Clone, Debug)]
pub struct PatternDetector<F = ChessboardFinder, R = SubpixRefiner> {
    finder: F,
    refiner: R,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new(DetectorParams::default())
    }
}

impl PatternDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self {
            finder: ChessboardFinder {
                candidates: params.candidates,
                grid: params.grid,
            },
            refiner: SubpixRefiner::new(params.subpix),
        }
    }
}

impl<F: CornerFinder, R: CornerRefiner> PatternDetector<F, R> {
    /// Assemble a detector from custom finder and refiner implementations.
    pub fn with_parts(finder: F, refiner: R) -> Self {
        Self { finder, refiner }
    }

    /// Search `img` for the full interior-corner grid of `pattern`.
    ///
    /// Partial boards are never reported as found.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, img), fields(w = img.width(), h = img.height())))]
    pub fn detect(&self, img: &GrayImage, pattern: &PatternSpec) -> DetectionResult {
        let search = self.finder.find(img, pattern);

        let Some(mut corners) = search
            .corners
            .filter(|c| c.len() == pattern.corner_count())
        else {
            log::debug!(
                "pattern {}x{} not found among {} candidates",
                pattern.width,
                pattern.height,
                search.candidates.len()
            );
            return DetectionResult {
                found: false,
                corners: Vec::new(),
                candidates: search.candidates,
            };
        };

        self.refiner.refine(img, &mut corners);
        DetectionResult {
            found: true,
            corners,
            candidates: search.candidates,
        }
    }
}
