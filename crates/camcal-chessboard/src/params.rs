use serde::{Deserialize, Serialize};

/// ChESS candidate extraction settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CandidateParams {
    /// Response threshold relative to the strongest response in the frame.
    pub threshold_rel: f32,
    /// Non-maximum suppression radius in pixels.
    pub nms_radius: u32,
    /// Absolute response below which candidates are dropped.
    pub min_response: f32,
}

impl Default for CandidateParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
            min_response: 0.0,
        }
    }
}

/// Lattice growth settings.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridSearchParams {
    /// How many seeds (closest to the candidate centroid first) to try.
    pub max_seeds: usize,
    /// Nearest neighbours inspected when estimating the seed axes.
    pub seed_neighbors: usize,
    /// Acceptance radius around a predicted corner, relative to the local step.
    pub search_radius_rel: f32,
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
}

impl Default for GridSearchParams {
    fn default() -> Self {
        Self {
            max_seeds: 8,
            seed_neighbors: 8,
            search_radius_rel: 0.3,
            min_spacing_pix: 4.0,
            max_spacing_pix: 1000.0,
        }
    }
}

/// Subpixel refinement termination criteria.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubpixParams {
    /// Half size of the search window; the window spans `2 * half_window + 1` pixels.
    pub half_window: usize,
    pub max_iters: usize,
    /// Stop once a refinement step moves the corner less than this (pixels).
    pub epsilon: f32,
}

impl Default for SubpixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            epsilon: 0.1,
        }
    }
}

/// Parameters of the default pattern detector.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorParams {
    pub candidates: CandidateParams,
    pub grid: GridSearchParams,
    pub subpix: SubpixParams,
}
