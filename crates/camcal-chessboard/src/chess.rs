//! Adapter from `chess-corners` X-junction responses to plain candidate points.

use crate::params::CandidateParams;
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use nalgebra::Point2;

/// One X-junction candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub position: Point2<f32>,
    pub strength: f32,
}

/// ChESS configuration derived from the candidate parameters.
pub fn chess_config(params: &CandidateParams) -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.params.threshold_rel = params.threshold_rel as _;
    cfg.params.nms_radius = params.nms_radius as _;
    cfg
}

/// Run the ChESS detector and keep candidates above `min_response`.
pub fn detect_candidates(img: &image::GrayImage, params: &CandidateParams) -> Vec<Candidate> {
    let cfg = chess_config(params);
    find_chess_corners_image(img, &cfg)
        .iter()
        .map(adapt_chess_corner)
        .filter(|c| c.strength >= params.min_response)
        .collect()
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Candidate {
    Candidate {
        position: Point2::new(c.x, c.y),
        strength: c.response,
    }
}
