use crate::sketch::model::{Grid, Point};

pub const INK: u8 = 255;

/// Inclusive pixel bounds of a stroke, already clipped to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClipBox {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl ClipBox {
    /// Bounding box of `start..end` grown by `pad`, or `None` when it misses
    /// the grid entirely. Works in `i64` so no coordinate/pad pair overflows.
    fn around(start: Point, end: Point, pad: i64, width: u32, height: u32) -> Option<Self> {
        let x0 = (i64::from(start.0.min(end.0)) - pad).max(0);
        let y0 = (i64::from(start.1.min(end.1)) - pad).max(0);
        let x1 = (i64::from(start.0.max(end.0)) + pad).min(i64::from(width) - 1);
        let y1 = (i64::from(start.1.max(end.1)) + pad).min(i64::from(height) - 1);
        if x1 < x0 || y1 < y0 {
            return None;
        }
        Some(Self {
            x0: x0 as usize,
            y0: y0 as usize,
            x1: x1 as usize,
            y1: y1 as usize,
        })
    }
}

/// Rasterizes a round-capped segment of `stroke_width` pixels into `grid`.
/// A missing `from` stamps a single dot at `to`. Pixels outside the grid are
/// clipped. Returns whether any pixel was written.
pub fn draw_stroke(
    grid: &mut Grid,
    from: Option<Point>,
    to: Point,
    stroke_width: u32,
    value: u8,
) -> bool {
    let start = from.unwrap_or(to);
    let (width, height) = grid.size();
    let radius = stroke_width.saturating_sub(1) / 2;
    let Some(clip) = ClipBox::around(start, to, i64::from(radius) + 1, width, height) else {
        return false;
    };

    let radius_sq = (radius as f32) * (radius as f32);
    let row_stride = width as usize;
    let pixels = grid.pixels_mut();
    let mut touched = false;
    for y in clip.y0..=clip.y1 {
        let row = &mut pixels[y * row_stride..(y + 1) * row_stride];
        for x in clip.x0..=clip.x1 {
            if point_segment_distance_sq((x as f32, y as f32), start, to) <= radius_sq {
                row[x] = value;
                touched = true;
            }
        }
    }
    touched
}

fn point_segment_distance_sq(point: (f32, f32), start: Point, end: Point) -> f32 {
    let (px, py) = point;
    let x0 = start.0 as f32;
    let y0 = start.1 as f32;
    let vx = end.0 as f32 - x0;
    let vy = end.1 as f32 - y0;
    let len_sq = vx * vx + vy * vy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - x0) * vx + (py - y0) * vy) / len_sq).clamp(0.0, 1.0)
    };
    let dx = px - (x0 + vx * t);
    let dy = py - (y0 + vy * t);
    dx * dx + dy * dy
}

/// Expands a single channel grid into RGBA bytes for texture upload.
pub fn grid_to_rgba(grid: &Grid) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(grid.pixels().len() * 4);
    for value in grid.pixels() {
        rgba.extend_from_slice(&[*value, *value, *value, 255]);
    }
    rgba
}
