use crate::{AccumulatorError, CacheError, ReportError, SourceError};
use camcal_core::PatternError;
use camcal_solver::SolverError;
use std::path::PathBuf;

/// Fatal errors of a calibration session.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Source(SourceError),
    #[error(transparent)]
    Accumulator(#[from] AccumulatorError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("calibration failed: {0}")]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to prepare debug directory {path}: {source}")]
    DebugDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write debug image {path}: {source}")]
    DebugImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl From<SourceError> for SessionError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::InvalidInput(path) => SessionError::InvalidInput(format!(
                "{} is neither an image directory nor a readable video file or device",
                path.display()
            )),
            other => SessionError::Source(other),
        }
    }
}
