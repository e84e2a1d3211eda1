use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern must have at least 2x2 interior corners (got {width}x{height})")]
    TooSmall { width: u32, height: u32 },
}

/// Interior-corner layout of a planar checkerboard.
///
/// `width` counts corners along a board row (the object x axis), `height`
/// counts rows (the object y axis).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub width: u32,
    pub height: u32,
}

impl Default for PatternSpec {
    fn default() -> Self {
        Self {
            width: 6,
            height: 9,
        }
    }
}

impl PatternSpec {
    pub fn new(width: u32, height: u32) -> Result<Self, PatternError> {
        if width < 2 || height < 2 {
            return Err(PatternError::TooSmall { width, height });
        }
        Ok(Self { width, height })
    }

    /// Number of interior corners.
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major index of the corner at column `x`, row `y`.
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Canonical object points on the `z = 0` plane, one unit per square.
    ///
    /// Ordered row-major: `x` varies fastest, so point `k` is
    /// `(k % width, k / width, 0)`.
    pub fn object_points(&self) -> Vec<Point3<f32>> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Point3::new(x as f32, y as f32, 0.0)))
            .collect()
    }
}
