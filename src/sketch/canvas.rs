use crate::sketch::model::{Grid, PenState, Point, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::sketch::render::{draw_stroke, INK};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct CanvasState {
    grid: Grid,
    pen: PenState,
}

impl CanvasState {
    fn move_pen(&mut self, point: Point) -> Option<(Point, Point)> {
        if !self.pen.is_down {
            return None;
        }
        let from = self.pen.last_point.unwrap_or(point);
        self.pen.last_point = Some(point);
        Some((from, point))
    }

    fn stroke(&mut self, from: Option<Point>, to: Point, width: u32) -> bool {
        draw_stroke(&mut self.grid, from, to, width, INK)
    }
}

/// The drawing surface and pen state, shared between the thread that
/// delivers pointer events and the control loop.
///
/// Grid and pen live behind one lock. Every operation holds it only for the
/// duration of its own mutation or copy; nothing slow ever runs under it.
#[derive(Debug, Clone)]
pub struct Canvas {
    inner: Arc<Mutex<CanvasState>>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CanvasState {
                grid: Grid::new(width, height),
                pen: PenState::default(),
            })),
        }
    }

    // A panicked writer still leaves a well formed byte grid behind.
    fn lock(&self) -> MutexGuard<'_, CanvasState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn size(&self) -> (u32, u32) {
        self.lock().grid.size()
    }

    /// Returns whether any pixel landed on the canvas.
    pub fn stroke(&self, from: Option<Point>, to: Point, width: u32) -> bool {
        self.lock().stroke(from, to, width)
    }

    pub fn clear(&self) {
        self.lock().grid.fill(0);
    }

    pub fn snapshot(&self) -> Grid {
        self.lock().grid.clone()
    }

    pub fn set_pen_down(&self, point: Point) {
        let mut state = self.lock();
        state.pen.is_down = true;
        state.pen.last_point = Some(point);
    }

    pub fn set_pen_up(&self) {
        self.lock().pen.is_down = false;
    }

    /// Advances the pen and returns the segment to draw, or `None` while the
    /// pen is up.
    pub fn move_pen(&self, point: Point) -> Option<(Point, Point)> {
        self.lock().move_pen(point)
    }

    /// `move_pen` followed by `stroke` as one step, so readers never see the
    /// pen advanced without its ink.
    pub fn drag_to(&self, point: Point, width: u32) -> bool {
        let mut state = self.lock();
        match state.move_pen(point) {
            Some((from, to)) => state.stroke(Some(from), to, width),
            None => false,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.lock().pen.is_down
    }

    pub fn pen(&self) -> PenState {
        self.lock().pen
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(CANVAS_WIDTH, CANVAS_HEIGHT)
    }
}
