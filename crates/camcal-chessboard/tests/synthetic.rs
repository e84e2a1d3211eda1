use camcal_chessboard::{render_overlay, PatternDetector};
use camcal_core::PatternSpec;
use image::{GrayImage, Luma};
use nalgebra::{Matrix3, Point2, Vector3};

const SQUARE: f64 = 32.0;

/// Board-to-image homography: a slightly rotated, slightly tilted board.
fn board_homography(angle: f64, origin: (f64, f64)) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(
        SQUARE * c,
        -SQUARE * s,
        origin.0,
        SQUARE * s,
        SQUARE * c,
        origin.1,
        2e-4,
        1e-4,
        1.0,
    )
}

fn project(h: &Matrix3<f64>, x: f64, y: f64) -> Point2<f64> {
    let v = h * Vector3::new(x, y, 1.0);
    Point2::new(v.x / v.z, v.y / v.z)
}

/// Render `pattern` (interior corners) as a black/white board with a white
/// margin, 4x4 supersampled.
fn render_board(pattern: &PatternSpec, h: &Matrix3<f64>, w: u32, ht: u32) -> GrayImage {
    let inv = h.try_inverse().expect("invertible homography");
    let ss = 4;
    GrayImage::from_fn(w, ht, |x, y| {
        let mut acc = 0u32;
        for sy in 0..ss {
            for sx in 0..ss {
                let px = x as f64 + (sx as f64 + 0.5) / ss as f64 - 0.5;
                let py = y as f64 + (sy as f64 + 0.5) / ss as f64 - 0.5;
                let b = project(&inv, px, py);
                let inside = b.x >= -1.0
                    && b.y >= -1.0
                    && b.x < pattern.width as f64
                    && b.y < pattern.height as f64;
                let black =
                    inside && (b.x.floor() as i64 + b.y.floor() as i64).rem_euclid(2) == 0;
                if !black {
                    acc += 1;
                }
            }
        }
        Luma([(20.0 + 215.0 * acc as f64 / (ss * ss) as f64).round() as u8])
    })
}

fn truth_corners(pattern: &PatternSpec, h: &Matrix3<f64>) -> Vec<Point2<f64>> {
    (0..pattern.height)
        .flat_map(|j| (0..pattern.width).map(move |i| (i, j)))
        .map(|(i, j)| project(h, i as f64, j as f64))
        .collect()
}

#[test]
fn detects_full_board_in_row_major_order() {
    let pattern = PatternSpec::default();
    let h = board_homography(0.1, (120.0, 80.0));
    let img = render_board(&pattern, &h, 480, 520);

    let result = PatternDetector::default().detect(&img, &pattern);
    assert!(result.found, "{} candidates", result.candidates.len());
    assert_eq!(result.corners.len(), 54);

    let truth = truth_corners(&pattern, &h);
    for (k, (got, want)) in result.corners.iter().zip(truth.iter()).enumerate() {
        let err = ((got.x as f64 - want.x).powi(2) + (got.y as f64 - want.y).powi(2)).sqrt();
        assert!(err < 0.5, "corner {k}: got {got:?}, want {want:?}");
    }

    let vis = render_overlay(&img, &pattern, &result);
    assert_eq!(vis.dimensions(), img.dimensions());
}

#[test]
fn wrong_pattern_size_is_not_found() {
    let board = PatternSpec::default();
    let h = board_homography(0.1, (120.0, 80.0));
    let img = render_board(&board, &h, 480, 520);

    let other = PatternSpec::new(7, 9).unwrap();
    let result = PatternDetector::default().detect(&img, &other);
    assert!(!result.found);
    assert!(result.corners.is_empty());
}

#[test]
fn board_cut_by_frame_edge_is_not_found() {
    let pattern = PatternSpec::default();
    let h = board_homography(0.0, (120.0, 80.0));
    // The lower rows fall outside this shorter frame.
    let img = render_board(&pattern, &h, 480, 300);

    let result = PatternDetector::default().detect(&img, &pattern);
    assert!(!result.found);
}
