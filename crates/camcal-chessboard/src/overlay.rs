//! Debug overlays: detected corners drawn over the analysed frame.

use crate::detector::DetectionResult;
use camcal_core::PatternSpec;
use image::{GrayImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};

const ROW_COLORS: [[u8; 3]; 7] = [
    [255, 0, 0],
    [255, 128, 0],
    [200, 200, 0],
    [0, 255, 0],
    [0, 200, 200],
    [0, 0, 255],
    [255, 0, 255],
];
const MISS_COLOR: [u8; 3] = [255, 0, 0];

/// Colour copy of `img` with the detection drawn on top.
///
/// A found board is drawn as circles joined row by row, each row in its own
/// colour; otherwise every candidate is circled in red.
pub fn render_overlay(img: &GrayImage, pattern: &PatternSpec, result: &DetectionResult) -> RgbImage {
    let mut vis = RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });

    if !result.found {
        for c in &result.candidates {
            draw_circle(&mut vis, c.x.round() as i32, c.y.round() as i32, 3, MISS_COLOR);
        }
        return vis;
    }

    let width = pattern.width as usize;
    let mut prev: Option<(i32, i32)> = None;
    for (k, c) in result.corners.iter().enumerate() {
        let color = ROW_COLORS[(k / width) % ROW_COLORS.len()];
        let (x, y) = (c.x.round() as i32, c.y.round() as i32);
        if let Some((px, py)) = prev {
            draw_line(&mut vis, px, py, x, y, color);
        }
        draw_circle(&mut vis, x, y, 4, color);
        prev = Some((x, y));
    }
    vis
}

/// Write an overlay as `<dir>/<frame_index:04>.png`.
pub fn write_overlay(
    dir: &Path,
    frame_index: usize,
    overlay: &RgbImage,
) -> Result<PathBuf, image::ImageError> {
    let path = dir.join(format!("{frame_index:04}.png"));
    overlay.save(&path)?;
    Ok(path)
}

fn put(vis: &mut RgbImage, x: i32, y: i32, color: [u8; 3]) {
    if x >= 0 && y >= 0 && x < vis.width() as i32 && y < vis.height() as i32 {
        vis.put_pixel(x as u32, y as u32, Rgb(color));
    }
}

fn draw_circle(vis: &mut RgbImage, cx: i32, cy: i32, r: i32, color: [u8; 3]) {
    let (inner, outer) = ((r - 1) * (r - 1), r * r);
    for dy in -r..=r {
        for dx in -r..=r {
            let d = dx * dx + dy * dy;
            if d <= outer && d > inner {
                put(vis, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Bresenham.
fn draw_line(vis: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 3]) {
    let (mut x, mut y) = (x0, y0);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(vis, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
