use crate::PatternSpec;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Violations of the per-view correspondence invariant.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CorrespondenceError {
    #[error("object/image point counts differ ({object} vs {image})")]
    LengthMismatch { object: usize, image: usize },
    #[error("expected {expected} points per view, got {got}")]
    WrongPointCount { expected: usize, got: usize },
    #[error("object points of view {view} differ from the pattern grid")]
    ObjectGridMismatch { view: usize },
    #[error("frame size {got:?} differs from the session frame size {expected:?}")]
    ImageSizeMismatch { expected: ImageSize, got: ImageSize },
}

/// Frame dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Points of one accepted view, in pattern order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewCorrespondence {
    pub object_points: Vec<Point3<f32>>,
    pub image_points: Vec<Point2<f32>>,
}

impl ViewCorrespondence {
    #[inline]
    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

/// Ordered (object, image) point pairs for all accepted views of one session.
///
/// Every view holds exactly `pattern.corner_count()` points and its object
/// points are an identical copy of [`PatternSpec::object_points`].
#[derive(Clone, Debug, PartialEq)]
pub struct CorrespondenceSet {
    pattern: PatternSpec,
    object_grid: Vec<Point3<f32>>,
    views: Vec<ViewCorrespondence>,
    image_size: Option<ImageSize>,
}

impl CorrespondenceSet {
    pub fn new(pattern: PatternSpec) -> Self {
        Self {
            object_grid: pattern.object_points(),
            pattern,
            views: Vec::new(),
            image_size: None,
        }
    }

    /// Rebuild a set from stored parts, validating every view.
    pub fn from_parts(
        pattern: PatternSpec,
        views: Vec<ViewCorrespondence>,
        image_size: Option<ImageSize>,
    ) -> Result<Self, CorrespondenceError> {
        let mut set = Self::new(pattern);
        set.image_size = image_size;
        for view in views {
            set.push(view)?;
        }
        Ok(set)
    }

    pub fn pattern(&self) -> PatternSpec {
        self.pattern
    }

    pub fn views(&self) -> &[ViewCorrespondence] {
        &self.views
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn total_points(&self) -> usize {
        self.views.iter().map(ViewCorrespondence::len).sum()
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    /// Record the frame size; all frames of a session must share it.
    pub fn observe_image_size(&mut self, size: ImageSize) -> Result<(), CorrespondenceError> {
        match self.image_size {
            Some(expected) if expected != size => Err(CorrespondenceError::ImageSizeMismatch {
                expected,
                got: size,
            }),
            _ => {
                self.image_size = Some(size);
                Ok(())
            }
        }
    }

    fn validate(&self, view: &ViewCorrespondence) -> Result<(), CorrespondenceError> {
        let object = view.object_points.len();
        let image = view.image_points.len();
        if object != image {
            return Err(CorrespondenceError::LengthMismatch { object, image });
        }
        let expected = self.pattern.corner_count();
        if image != expected {
            return Err(CorrespondenceError::WrongPointCount {
                expected,
                got: image,
            });
        }
        if view.object_points != self.object_grid {
            return Err(CorrespondenceError::ObjectGridMismatch {
                view: self.views.len(),
            });
        }
        Ok(())
    }

    /// Append one view after checking the invariant; the set is left
    /// untouched on error.
    pub fn push(&mut self, view: ViewCorrespondence) -> Result<(), CorrespondenceError> {
        self.validate(&view)?;
        self.views.push(view);
        Ok(())
    }

    /// Append the detected corners of one frame paired with the pattern grid.
    pub fn push_image_points(
        &mut self,
        image_points: Vec<Point2<f32>>,
    ) -> Result<(), CorrespondenceError> {
        self.push(ViewCorrespondence {
            object_points: self.object_grid.clone(),
            image_points,
        })
    }
}
