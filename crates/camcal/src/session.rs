use crate::cache::{load_correspondences, save_correspondences};
use crate::report::write_report;
use crate::source::{Frame, FrameSource, SourceError};
use crate::{CorrespondenceAccumulator, SessionConfig, SessionError};
use camcal_chessboard::{render_overlay, write_overlay, PatternDetector};
use camcal_core::CorrespondenceSet;
use camcal_solver::{CalibrationResult, CalibrationSolver, SolverError};
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Notifications emitted while a session runs.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// A frame was searched for the pattern.
    FrameSearched { index: usize, found: bool },
    /// `max_frames` views were accepted; no further frames are read.
    LimitReached { views: usize },
    /// Views were restored from the corner cache instead of detected.
    CornersLoaded { views: usize },
    /// The solver finished; emitted before the report is written.
    Calibrated(&'a CalibrationResult),
}

/// One calibration run: detection over a frame source, accumulation, solve,
/// report.
pub struct Session {
    config: SessionConfig,
    detector: PatternDetector,
    solver: CalibrationSolver,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            detector: PatternDetector::new(config.detector.clone()),
            solver: CalibrationSolver::new(config.solver.clone()),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the detector over `frames` and collect the accepted views.
    ///
    /// Frames without a complete board are skipped. Reading stops as soon as
    /// `max_frames` views are accepted.
    pub fn collect<I, F>(&self, frames: I, progress: &mut F) -> Result<CorrespondenceSet, SessionError>
    where
        I: IntoIterator<Item = Result<Frame, SourceError>>,
        F: FnMut(&ProgressEvent<'_>),
    {
        let pattern = self.config.pattern;
        if let Some(dir) = &self.config.debug_dir {
            std::fs::create_dir_all(dir).map_err(|source| SessionError::DebugDir {
                path: dir.clone(),
                source,
            })?;
        }

        let mut acc = CorrespondenceAccumulator::new(pattern, self.config.source.max_frames);
        if acc.is_full() {
            progress(&ProgressEvent::LimitReached { views: 0 });
            return Ok(acc.into_set());
        }

        for frame in frames {
            let frame = frame?;
            let result = self.detector.detect(&frame.image, &pattern);
            progress(&ProgressEvent::FrameSearched {
                index: frame.index,
                found: result.found,
            });

            if let Some(dir) = &self.config.debug_dir {
                let vis = render_overlay(&frame.image, &pattern, &result);
                write_overlay(dir, frame.index, &vis).map_err(|source| SessionError::DebugImage {
                    path: dir.join(format!("{:04}.png", frame.index)),
                    source,
                })?;
            }

            if !result.found {
                log::debug!("frame {}: pattern not found", frame.index);
                continue;
            }

            acc.append_detection(result.corners, frame.size())?;
            log::debug!("frame {}: accepted view {}", frame.index, acc.len());
            if acc.is_full() {
                log::info!("found {} frames with the chessboard", acc.len());
                progress(&ProgressEvent::LimitReached { views: acc.len() });
                break;
            }
        }

        Ok(acc.into_set())
    }

    /// Calibrate from accumulated views at their recorded frame size.
    pub fn calibrate(&self, set: &CorrespondenceSet) -> Result<CalibrationResult, SessionError> {
        let Some(size) = set.image_size() else {
            return Err(SolverError::TooFewViews {
                got: set.len(),
                min: self.solver.params().min_views,
            }
            .into());
        };
        log::info!("calibrating with {} views of {}x{}", set.len(), size.width, size.height);
        Ok(self.solver.calibrate(set, size)?)
    }

    /// Full pipeline: views from `input` (or from the corner cache when
    /// `reuse_corners` is set), calibration, report written to `out`.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, progress), fields(input = %input.display())))]
    pub fn run<F>(&self, input: &Path, out: &Path, mut progress: F) -> Result<CalibrationResult, SessionError>
    where
        F: FnMut(&ProgressEvent<'_>),
    {
        let set = if self.config.reuse_corners {
            let path = self.config.corners.as_deref().ok_or_else(|| {
                SessionError::InvalidConfig("reusing corners requires a corners cache path".into())
            })?;
            let set = load_correspondences(path, self.config.pattern)?;
            progress(&ProgressEvent::CornersLoaded { views: set.len() });
            set
        } else {
            let source = FrameSource::open(input, self.config.source.framestep)?
                .with_fit(self.config.source.fit);
            let set = self.collect(source, &mut progress)?;
            if let Some(path) = &self.config.corners {
                save_correspondences(path, &set)?;
            }
            set
        };

        let result = self.calibrate(&set)?;
        progress(&ProgressEvent::Calibrated(&result));
        write_report(out, &result)?;
        Ok(result)
    }
}
