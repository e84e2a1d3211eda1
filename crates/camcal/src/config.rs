use camcal_chessboard::DetectorParams;
use camcal_core::{ImageSize, PatternSpec};
use camcal_solver::SolverParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::SessionError;

/// Frame acquisition options.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Use every Nth frame of a stream source. Ignored for image directories.
    pub framestep: usize,
    /// Stop after this many accepted views.
    pub max_frames: Option<usize>,
    /// Fit every frame to this size before detection.
    pub fit: Option<ImageSize>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            framestep: 20,
            max_frames: None,
            fit: None,
        }
    }
}

/// Everything one calibration run needs, passed explicitly down the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub pattern: PatternSpec,
    pub source: SourceOptions,
    pub detector: DetectorParams,
    pub solver: SolverParams,
    /// Directory receiving one overlay PNG per analysed frame.
    pub debug_dir: Option<PathBuf>,
    /// Correspondence cache path.
    pub corners: Option<PathBuf>,
    /// Load views from `corners` instead of scanning the input.
    pub reuse_corners: bool,
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path).map_err(|source| SessionError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: SessionConfig =
            serde_json::from_str(&text).map_err(|source| SessionError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field constraints not expressed by the types.
    pub fn validate(&self) -> Result<(), SessionError> {
        PatternSpec::new(self.pattern.width, self.pattern.height)?;
        if self.source.framestep == 0 {
            return Err(SessionError::InvalidConfig("framestep must be at least 1".into()));
        }
        if self.reuse_corners && self.corners.is_none() {
            return Err(SessionError::InvalidConfig(
                "reusing corners requires a corners cache path".into(),
            ));
        }
        if self.source.fit.is_some_and(|s| s.is_empty()) {
            return Err(SessionError::InvalidConfig("fit size must be non-zero".into()));
        }
        Ok(())
    }
}
