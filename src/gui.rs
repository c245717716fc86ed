use crate::sketch::display::SharedDisplay;
use crate::sketch::input::{EventSource, PointerEvent};
use crate::sketch::model::Point;
use crate::sketch::render::grid_to_rgba;
use anyhow::{anyhow, Result};
use eframe::egui;
use std::time::Duration;

pub const WINDOW_TITLE: &str = "Digit Recognizer";
const LABEL_OFFSET: egui::Vec2 = egui::vec2(10.0, 8.0);
const LABEL_SIZE: f32 = 20.0;

/// Maps a window position inside `rect` to canvas pixel coordinates. Positions
/// outside the rect map outside the canvas and are clipped when stroked.
pub fn to_canvas_point(rect: egui::Rect, canvas_size: (u32, u32), pos: egui::Pos2) -> Point {
    let scale_x = canvas_size.0 as f32 / rect.width().max(1.0);
    let scale_y = canvas_size.1 as f32 / rect.height().max(1.0);
    (
        ((pos.x - rect.min.x) * scale_x).floor() as i32,
        ((pos.y - rect.min.y) * scale_y).floor() as i32,
    )
}

pub fn key_to_char(key: egui::Key) -> Option<char> {
    match key {
        egui::Key::Q => Some('q'),
        egui::Key::C => Some('c'),
        _ => None,
    }
}

/// Host window: delivers pointer and key events to the event source on the
/// UI thread and shows the newest frame published by the control loop.
pub struct SketchApp {
    events: EventSource,
    display: SharedDisplay,
    canvas_size: (u32, u32),
    repaint_interval: Duration,
    texture: Option<egui::TextureHandle>,
    shown_generation: u64,
    label: String,
    label_color: egui::Color32,
}

impl SketchApp {
    pub fn new(events: EventSource, display: SharedDisplay, repaint_interval: Duration) -> Self {
        let canvas_size = events.canvas().size();
        Self {
            events,
            display,
            canvas_size,
            repaint_interval,
            texture: None,
            shown_generation: 0,
            label: String::new(),
            label_color: egui::Color32::WHITE,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas_size
    }

    fn forward_events(&self, ctx: &egui::Context, rect: egui::Rect) {
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button: egui::PointerButton::Primary,
                    pressed,
                    ..
                } => {
                    let point = to_canvas_point(rect, self.canvas_size, pos);
                    if pressed && rect.contains(pos) {
                        self.events.handle_pointer(PointerEvent::down(point));
                    } else if !pressed {
                        self.events.handle_pointer(PointerEvent::up(point));
                    }
                }
                egui::Event::PointerMoved(pos) => {
                    let point = to_canvas_point(rect, self.canvas_size, pos);
                    self.events.handle_pointer(PointerEvent::moved(point));
                }
                egui::Event::Key {
                    key,
                    pressed: true,
                    repeat: false,
                    ..
                } => {
                    if let Some(key) = key_to_char(key) {
                        let _ = self.events.handle_key(key);
                    }
                }
                _ => {}
            }
        }
    }

    fn refresh_texture(&mut self, ctx: &egui::Context) {
        let Some((generation, frame)) = self.display.latest() else {
            return;
        };
        if generation == self.shown_generation && self.texture.is_some() {
            return;
        }
        let size = [frame.grid.width() as usize, frame.grid.height() as usize];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, &grid_to_rgba(&frame.grid));
        match self.texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::NEAREST),
            None => {
                self.texture =
                    Some(ctx.load_texture("sketch-canvas", image, egui::TextureOptions::NEAREST));
            }
        }
        let [r, g, b] = frame.tone().rgb();
        self.label = frame.label();
        self.label_color = egui::Color32::from_rgb(r, g, b);
        self.shown_generation = generation;
    }
}

impl eframe::App for SketchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.display.is_closed() {
            tracing::debug!("control loop stopped, closing window");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        self.refresh_texture(ctx);
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let desired = egui::vec2(self.canvas_size.0 as f32, self.canvas_size.1 as f32);
                let (rect, _response) = ui.allocate_exact_size(desired, egui::Sense::drag());
                self.forward_events(ctx, rect);

                let painter = ui.painter_at(rect);
                if let Some(texture) = &self.texture {
                    painter.image(
                        texture.id(),
                        rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
                painter.text(
                    rect.min + LABEL_OFFSET,
                    egui::Align2::LEFT_TOP,
                    &self.label,
                    egui::FontId::proportional(LABEL_SIZE),
                    self.label_color,
                );
            });
        ctx.request_repaint_after(self.repaint_interval);
    }
}

/// Runs the window on the calling thread until it is closed.
pub fn run(app: SketchApp) -> Result<()> {
    let (width, height) = app.canvas_size();
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([width as f32, height as f32])
            .with_resizable(false),
        ..Default::default()
    };
    eframe::run_native(
        WINDOW_TITLE,
        native_options,
        Box::new(move |_cc| Box::new(app)),
    )
    .map_err(|err| anyhow!("window event loop failed: {err}"))
}
