use camcal_core::{CorrespondenceError, CorrespondenceSet, ImageSize, PatternSpec, ViewCorrespondence};
use nalgebra::{Point2, Point3};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AccumulatorError {
    #[error("already holds the maximum of {max} views")]
    Full { max: usize },
    #[error(transparent)]
    Correspondence(#[from] CorrespondenceError),
}

/// Collects accepted views until an optional cap is reached.
#[derive(Clone, Debug)]
pub struct CorrespondenceAccumulator {
    set: CorrespondenceSet,
    max_frames: Option<usize>,
}

impl CorrespondenceAccumulator {
    pub fn new(pattern: PatternSpec, max_frames: Option<usize>) -> Self {
        Self {
            set: CorrespondenceSet::new(pattern),
            max_frames,
        }
    }

    /// Resume from a restored set; the cap still applies to the total.
    pub fn from_set(set: CorrespondenceSet, max_frames: Option<usize>) -> Self {
        Self { set, max_frames }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// True once `max_frames` views have been accepted.
    pub fn is_full(&self) -> bool {
        self.max_frames.is_some_and(|max| self.set.len() >= max)
    }

    /// Accept one view. On error the accumulator is unchanged.
    pub fn append(
        &mut self,
        object_points: Vec<Point3<f32>>,
        image_points: Vec<Point2<f32>>,
    ) -> Result<(), AccumulatorError> {
        if let Some(max) = self.max_frames.filter(|_| self.is_full()) {
            return Err(AccumulatorError::Full { max });
        }
        self.set.push(ViewCorrespondence {
            object_points,
            image_points,
        })?;
        Ok(())
    }

    /// Accept the ordered corners of one frame of size `size`.
    pub fn append_detection(
        &mut self,
        image_points: Vec<Point2<f32>>,
        size: ImageSize,
    ) -> Result<(), AccumulatorError> {
        if let Some(max) = self.max_frames.filter(|_| self.is_full()) {
            return Err(AccumulatorError::Full { max });
        }
        let mut next = self.set.clone();
        next.observe_image_size(size)?;
        next.push_image_points(image_points)?;
        self.set = next;
        Ok(())
    }

    pub fn set(&self) -> &CorrespondenceSet {
        &self.set
    }

    pub fn into_set(self) -> CorrespondenceSet {
        self.set
    }
}
