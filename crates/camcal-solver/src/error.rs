/// Calibration failures. All are fatal for the session.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("need at least {min} views, got {got}")]
    TooFewViews { got: usize, min: usize },
    #[error("view {view} has {got} points, need at least 4")]
    TooFewPoints { view: usize, got: usize },
    #[error("view {view}: {object} object points but {image} image points")]
    LengthMismatch {
        view: usize,
        object: usize,
        image: usize,
    },
    #[error("image size {width}x{height} is empty")]
    EmptyImageSize { width: u32, height: u32 },
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
    #[error("optimizer failed: {0}")]
    Numerical(String),
    #[error("optimization produced non-finite parameters")]
    NonFinite,
}
