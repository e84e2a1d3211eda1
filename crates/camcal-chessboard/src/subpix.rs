//! Gradient-orthogonality subpixel corner refinement.
//!
//! At a saddle point `q`, every image gradient `g(p)` in the neighbourhood is
//! orthogonal to `p - q`. Minimising `sum w(p) (g(p) . (p - q))^2` over a
//! Gaussian-weighted window gives a 2x2 linear system for `q`, iterated until
//! the update drops below `epsilon`.

use crate::params::SubpixParams;
use camcal_core::{sample_bilinear, GrayImageView};
use nalgebra::Point2;

/// Iterative subpixel refiner with a precomputed Gaussian window.
#[derive(Clone, Debug)]
pub struct SubpixRefiner {
    params: SubpixParams,
    mask: Vec<f64>,
}

impl Default for SubpixRefiner {
    fn default() -> Self {
        Self::new(SubpixParams::default())
    }
}

impl SubpixRefiner {
    pub fn new(params: SubpixParams) -> Self {
        let w = params.half_window as i32;
        let side = (2 * w + 1) as usize;
        let coeff = 1.0 / ((w * w).max(1) as f64);
        let weights: Vec<f64> = (-w..=w)
            .map(|d| (-(d * d) as f64 * coeff).exp())
            .collect();

        let mut mask = Vec::with_capacity(side * side);
        for wy in &weights {
            for wx in &weights {
                mask.push(wx * wy);
            }
        }
        Self { params, mask }
    }

    pub fn params(&self) -> &SubpixParams {
        &self.params
    }

    /// Refine one corner. Returns the input unchanged when the iteration
    /// degenerates or wanders outside the search window.
    pub fn refine_point(&self, img: &GrayImageView<'_>, start: Point2<f32>) -> Point2<f32> {
        let w = self.params.half_window as i32;
        let side = (2 * w + 1) as usize;
        let eps_sq = (self.params.epsilon as f64).powi(2);

        let sample = |x: f64, y: f64| sample_bilinear(img, x as f32, y as f32) as f64;

        let (mut cx, mut cy) = (start.x as f64, start.y as f64);
        for _ in 0..self.params.max_iters {
            let (mut a, mut b, mut c) = (0.0f64, 0.0f64, 0.0f64);
            let (mut bb1, mut bb2) = (0.0f64, 0.0f64);

            for (row, dy) in (-w..=w).enumerate() {
                for (col, dx) in (-w..=w).enumerate() {
                    let x = cx + dx as f64;
                    let y = cy + dy as f64;
                    let gx = sample(x + 1.0, y) - sample(x - 1.0, y);
                    let gy = sample(x, y + 1.0) - sample(x, y - 1.0);
                    let m = self.mask[row * side + col];

                    let gxx = gx * gx * m;
                    let gxy = gx * gy * m;
                    let gyy = gy * gy * m;

                    a += gxx;
                    b += gxy;
                    c += gyy;
                    bb1 += gxx * dx as f64 + gxy * dy as f64;
                    bb2 += gxy * dx as f64 + gyy * dy as f64;
                }
            }

            let det = a * c - b * b;
            if det.abs() <= f64::EPSILON * f64::EPSILON {
                break;
            }
            let nx = cx + (c * bb1 - b * bb2) / det;
            let ny = cy + (a * bb2 - b * bb1) / det;
            let err = (nx - cx).powi(2) + (ny - cy).powi(2);
            cx = nx;
            cy = ny;

            if !img.contains(cx as f32, cy as f32) || err <= eps_sq {
                break;
            }
        }

        let moved_x = (cx - start.x as f64).abs();
        let moved_y = (cy - start.y as f64).abs();
        if !cx.is_finite() || !cy.is_finite() || moved_x > w as f64 || moved_y > w as f64 {
            return start;
        }
        Point2::new(cx as f32, cy as f32)
    }

    pub fn refine_all(&self, img: &GrayImageView<'_>, corners: &mut [Point2<f32>]) {
        for corner in corners.iter_mut() {
            *corner = self.refine_point(img, *corner);
        }
    }
}
