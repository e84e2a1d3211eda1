//! Canonical corner ordering for a complete lattice.
//!
//! The lattice found by growth has an arbitrary origin and orientation. Of the
//! eight grid symmetries, only those mapping the lattice onto a
//! `width x height` grid with right-handed image axes are admissible (two for
//! rectangular patterns, four for square ones); the one whose first corner is
//! closest to the image origin is chosen, so the same physical board yields the
//! same ordering frame after frame.

use crate::grid::Lattice;
use camcal_core::{GridTransform, PatternSpec, GRID_TRANSFORMS_D4};
use nalgebra::{Point2, Vector2};

/// Row-major corners (`y` outer, `x` inner) matching `pattern.object_points()`.
pub fn order_corners(
    lattice: &Lattice,
    points: &[Point2<f32>],
    pattern: &PatternSpec,
) -> Option<Vec<Point2<f32>>> {
    if lattice.len() != pattern.corner_count() || !lattice.is_complete() {
        return None;
    }

    let mut best: Option<(f32, Vec<Point2<f32>>)> = None;
    for transform in GRID_TRANSFORMS_D4.iter() {
        let Some(grid) = apply_layout(lattice, points, pattern, transform) else {
            continue;
        };
        if handedness(&grid, pattern) <= 0.0 {
            continue;
        }
        let score = grid[0].x + grid[0].y;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, grid));
        }
    }
    best.map(|(_, grid)| grid)
}

fn apply_layout(
    lattice: &Lattice,
    points: &[Point2<f32>],
    pattern: &PatternSpec,
    transform: &GridTransform,
) -> Option<Vec<Point2<f32>>> {
    let mapped: Vec<((i32, i32), usize)> = lattice
        .iter()
        .map(|((i, j), idx)| {
            let [ti, tj] = transform.apply(i, j);
            ((ti, tj), idx)
        })
        .collect();

    let min_i = mapped.iter().map(|((i, _), _)| *i).min()?;
    let min_j = mapped.iter().map(|((_, j), _)| *j).min()?;
    let max_i = mapped.iter().map(|((i, _), _)| *i).max()?;
    let max_j = mapped.iter().map(|((_, j), _)| *j).max()?;

    let width = (max_i - min_i + 1) as u32;
    let height = (max_j - min_j + 1) as u32;
    if width != pattern.width || height != pattern.height {
        return None;
    }

    let mut grid = vec![Point2::origin(); pattern.corner_count()];
    for ((i, j), idx) in mapped {
        let x = (i - min_i) as u32;
        let y = (j - min_j) as u32;
        grid[pattern.index(x, y)] = points[idx];
    }
    Some(grid)
}

/// Cross product of the mean `+x` and `+y` board directions in image space.
/// Positive for the right-handed (image `y` pointing down) layout.
fn handedness(grid: &[Point2<f32>], pattern: &PatternSpec) -> f32 {
    let (w, h) = (pattern.width, pattern.height);
    let at = |x: u32, y: u32| grid[pattern.index(x, y)];

    let dx: Vector2<f32> = (at(w - 1, 0) - at(0, 0)) + (at(w - 1, h - 1) - at(0, h - 1));
    let dy: Vector2<f32> = (at(0, h - 1) - at(0, 0)) + (at(w - 1, h - 1) - at(w - 1, 0));
    dx.x * dy.y - dx.y * dy.x
}
