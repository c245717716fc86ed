use crate::sketch::canvas::Canvas;
use crate::sketch::messages::Command;
use crate::sketch::model::{Point, STROKE_WIDTH};
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub point: Point,
}

impl PointerEvent {
    pub fn down(point: Point) -> Self {
        Self {
            kind: PointerEventKind::Down,
            point,
        }
    }

    pub fn moved(point: Point) -> Self {
        Self {
            kind: PointerEventKind::Move,
            point,
        }
    }

    pub fn up(point: Point) -> Self {
        Self {
            kind: PointerEventKind::Up,
            point,
        }
    }
}

/// Applies raw pointer and key events from the host window to the canvas and
/// the command channel, one at a time in arrival order.
pub struct EventSource {
    canvas: Canvas,
    stroke_width: u32,
    commands: Sender<Command>,
}

impl EventSource {
    pub fn new(canvas: Canvas, commands: Sender<Command>) -> Self {
        Self {
            canvas,
            stroke_width: STROKE_WIDTH,
            commands,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn handle_pointer(&self, event: PointerEvent) {
        match event.kind {
            PointerEventKind::Down => self.canvas.set_pen_down(event.point),
            PointerEventKind::Up => self.canvas.set_pen_up(),
            PointerEventKind::Move => {
                self.canvas.drag_to(event.point, self.stroke_width);
            }
        }
    }

    /// Forwards `q`/`c` to the control loop. Returns the command that was
    /// sent, if any.
    pub fn handle_key(&self, key: char) -> Option<Command> {
        let command = Command::from_key(key)?;
        if self.commands.send(command).is_err() {
            tracing::debug!(?command, "control loop gone, dropping command");
            return None;
        }
        Some(command)
    }
}
