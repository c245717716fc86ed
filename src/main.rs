use anyhow::{Context, Result};
use digit_sketchpad::gui::{self, SketchApp};
use digit_sketchpad::logging;
use digit_sketchpad::settings::{self, Settings};
use digit_sketchpad::sketch::classifier::SequentialModel;
use digit_sketchpad::sketch::input::EventSource;
use digit_sketchpad::sketch::preprocess::MnistPreprocessor;
use digit_sketchpad::sketch::runtime::{spawn_control_loop, CONTROL_JOIN_TIMEOUT};
use digit_sketchpad::sketch::{Canvas, ControlLoop, SharedDisplay};
use std::sync::mpsc::channel;

fn main() -> Result<()> {
    let config_path = settings::config_path_from_args(std::env::args());
    let settings = Settings::load(&config_path)?;
    logging::init(settings.debug_logging, settings.log_file.clone());
    tracing::info!(
        model = %settings.model_path.display(),
        threshold = settings.confidence_threshold,
        policy = ?settings.unlock_policy,
        "config loaded from {}",
        config_path.display()
    );

    let classifier = SequentialModel::load(&settings.model_path).context("load classifier")?;

    let canvas = Canvas::default();
    let display = SharedDisplay::new();
    let (commands_tx, commands_rx) = channel();
    let control = ControlLoop::new(
        canvas.clone(),
        commands_rx,
        Box::new(MnistPreprocessor::new()),
        Box::new(classifier),
        Box::new(display.clone()),
        settings.loop_settings(),
    );
    let handle = spawn_control_loop(control)?;
    tracing::info!("controls: draw with the left mouse button, (c) clear, (q) quit");

    let app = SketchApp::new(
        EventSource::new(canvas, commands_tx),
        display,
        settings.tick_interval(),
    );
    let window_result = gui::run(app);
    handle.join_with_timeout(CONTROL_JOIN_TIMEOUT)?;
    window_result
}
