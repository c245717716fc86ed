use crate::sketch::canvas::Canvas;
use crate::sketch::classifier::Classifier;
use crate::sketch::display::{DisplaySink, Frame};
use crate::sketch::gate::{Gate, GateState, UnlockPolicy};
use crate::sketch::messages::{Command, TickOutcome};
use crate::sketch::model::Prediction;
use crate::sketch::preprocess::Preprocessor;
use anyhow::{Context, Result};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub confidence_threshold: f32,
    pub unlock_policy: UnlockPolicy,
    pub tick_interval: Duration,
}

impl LoopSettings {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            unlock_policy: UnlockPolicy::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Tick driver: polls commands, classifies the canvas while the gate is
/// active and pushes a frame to the display every tick.
pub struct ControlLoop {
    canvas: Canvas,
    commands: Receiver<Command>,
    preprocessor: Box<dyn Preprocessor>,
    classifier: Box<dyn Classifier>,
    sink: Box<dyn DisplaySink>,
    gate: Gate,
    prediction: Prediction,
    settings: LoopSettings,
}

impl ControlLoop {
    pub fn new(
        canvas: Canvas,
        commands: Receiver<Command>,
        preprocessor: Box<dyn Preprocessor>,
        classifier: Box<dyn Classifier>,
        sink: Box<dyn DisplaySink>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            canvas,
            commands,
            preprocessor,
            classifier,
            sink,
            gate: Gate::new(settings.unlock_policy),
            prediction: Prediction::NONE,
            settings,
        }
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn prediction(&self) -> Prediction {
        self.prediction
    }

    fn poll_command(&self) -> Option<Command> {
        match self.commands.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                tracing::debug!("command channel disconnected, stopping control loop");
                Some(Command::Quit)
            }
        }
    }

    fn clear(&mut self) {
        self.canvas.clear();
        self.gate.reset();
        self.prediction = Prediction::NONE;
        tracing::debug!("canvas cleared, inference re-enabled");
    }

    /// Runs one iteration. Quit is reported before any classification or
    /// rendering happens for this tick.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        match self.poll_command() {
            Some(Command::Quit) => return Ok(TickOutcome::Quit),
            Some(Command::Clear) => self.clear(),
            None => {}
        }

        let user_is_drawing = self.canvas.is_drawing();
        self.gate.observe_drawing(user_is_drawing);

        if self.gate.should_classify() {
            let started = Instant::now();
            let snapshot = self.canvas.snapshot();
            let input = self
                .preprocessor
                .process(&snapshot)
                .context("preprocess canvas snapshot")?;
            self.prediction = self
                .classifier
                .predict(&input)
                .context("classify canvas snapshot")?;
            tracing::trace!(
                digit = self.prediction.digit(),
                confidence = self.prediction.confidence(),
                elapsed_us = started.elapsed().as_micros() as u64,
                "classified canvas"
            );
            self.gate.evaluate(
                &self.prediction,
                user_is_drawing,
                self.settings.confidence_threshold,
            );
        }

        self.sink
            .present(Frame {
                grid: self.canvas.snapshot(),
                prediction: self.prediction,
                locked: self.gate.state().is_locked(),
            })
            .context("present frame")?;
        Ok(TickOutcome::Continue)
    }

    /// Ticks until quit or the first error. The display is closed when the
    /// loop is dropped, including while unwinding from a panic.
    pub fn run(mut self) -> Result<()> {
        tracing::info!(
            threshold = self.settings.confidence_threshold,
            policy = ?self.settings.unlock_policy,
            interval_ms = self.settings.tick_interval.as_millis() as u64,
            "control loop started"
        );
        let result = self.run_ticks();
        match &result {
            Ok(()) => tracing::info!("control loop stopped"),
            Err(err) => tracing::error!(error = %format!("{err:#}"), "control loop failed"),
        }
        result
    }

    fn run_ticks(&mut self) -> Result<()> {
        loop {
            let started = Instant::now();
            if self.tick()? == TickOutcome::Quit {
                return Ok(());
            }
            let remaining = self.settings.tick_interval.saturating_sub(started.elapsed());
            if !remaining.is_zero() {
                std::thread::sleep(remaining);
            }
        }
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        self.sink.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::model::{Grid, Tensor};
    use anyhow::bail;
    use std::collections::VecDeque;
    use std::sync::mpsc::{channel, Sender};
    use std::sync::{Arc, Mutex};

    struct NullPreprocessor;

    impl Preprocessor for NullPreprocessor {
        fn process(&self, _grid: &Grid) -> Result<Tensor> {
            Ok(Tensor::zeros(1, 1, 1))
        }
    }

    #[derive(Clone, Default)]
    struct Scripted {
        outputs: Arc<Mutex<VecDeque<Result<Prediction>>>>,
        calls: Arc<Mutex<usize>>,
    }

    impl Scripted {
        fn push(&self, digit: i32, confidence: f32) {
            self.outputs
                .lock()
                .expect("script lock")
                .push_back(Ok(Prediction::new(digit, confidence).expect("prediction")));
        }

        fn push_failure(&self) {
            self.outputs
                .lock()
                .expect("script lock")
                .push_back(Err(anyhow::anyhow!("inference failed")));
        }

        fn calls(&self) -> usize {
            *self.calls.lock().expect("calls lock")
        }
    }

    impl Classifier for Scripted {
        fn predict(&mut self, _input: &Tensor) -> Result<Prediction> {
            *self.calls.lock().expect("calls lock") += 1;
            match self.outputs.lock().expect("script lock").pop_front() {
                Some(result) => result,
                None => bail!("script exhausted"),
            }
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<Frame>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl DisplaySink for Recorder {
        fn present(&mut self, frame: Frame) -> Result<()> {
            self.frames.lock().expect("frames lock").push(frame);
            Ok(())
        }

        fn close(&mut self) {
            *self.closed.lock().expect("closed lock") = true;
        }
    }

    struct Harness {
        control: ControlLoop,
        canvas: Canvas,
        commands: Sender<Command>,
        classifier: Scripted,
        display: Recorder,
    }

    fn harness(policy: UnlockPolicy) -> Harness {
        let canvas = Canvas::new(32, 32);
        let (commands, rx) = channel();
        let classifier = Scripted::default();
        let display = Recorder::default();
        let mut settings = LoopSettings::new(0.8);
        settings.unlock_policy = policy;
        settings.tick_interval = Duration::from_millis(1);
        let control = ControlLoop::new(
            canvas.clone(),
            rx,
            Box::new(NullPreprocessor),
            Box::new(classifier.clone()),
            Box::new(display.clone()),
            settings,
        );
        Harness {
            control,
            canvas,
            commands,
            classifier,
            display,
        }
    }

    #[test]
    fn confident_idle_prediction_locks_and_stops_classifying() {
        let mut h = harness(UnlockPolicy::ExplicitClear);
        h.classifier.push(3, 0.9);

        assert_eq!(h.control.tick().expect("tick"), TickOutcome::Continue);
        assert_eq!(h.control.gate_state(), GateState::Locked);

        h.control.tick().expect("tick");
        assert_eq!(h.classifier.calls(), 1);

        let frames = h.display.frames.lock().expect("frames");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].label(), "Final: 3 (0.90)");
    }

    #[test]
    fn drawing_user_keeps_gate_active() {
        let mut h = harness(UnlockPolicy::ExplicitClear);
        h.canvas.set_pen_down((5, 5));
        h.classifier.push(3, 0.9);
        h.classifier.push(3, 0.95);

        h.control.tick().expect("tick");
        assert_eq!(h.control.gate_state(), GateState::Active);
        h.control.tick().expect("tick");
        assert_eq!(h.classifier.calls(), 2);
        assert_eq!(
            h.display.frames.lock().expect("frames")[1].label(),
            "Pred: 3 (0.95)"
        );
    }

    #[test]
    fn clear_unlocks_resets_prediction_and_wipes_canvas() {
        let mut h = harness(UnlockPolicy::ExplicitClear);
        h.canvas.stroke(None, (10, 10), 5);
        h.classifier.push(8, 0.99);
        h.control.tick().expect("tick");
        assert_eq!(h.control.gate_state(), GateState::Locked);

        h.commands.send(Command::Clear).expect("send clear");
        h.classifier.push(1, 0.1);
        h.control.tick().expect("tick");

        assert_eq!(h.control.gate_state(), GateState::Active);
        assert_eq!(h.control.prediction().digit(), 1);
        assert!(h.canvas.snapshot().is_blank());
        let frames = h.display.frames.lock().expect("frames");
        assert!(frames.last().expect("frame").grid.is_blank());
    }

    #[test]
    fn clear_discards_held_prediction() {
        let mut h = harness(UnlockPolicy::ExplicitClear);
        h.canvas.stroke(None, (10, 10), 5);
        h.classifier.push(8, 0.99);
        h.control.tick().expect("tick");
        assert_eq!(h.control.prediction().digit(), 8);

        h.control.clear();
        assert_eq!(h.control.gate_state(), GateState::Active);
        assert_eq!(h.control.prediction(), Prediction::NONE);
        assert!(h.canvas.snapshot().is_blank());
    }

    #[test]
    fn one_command_per_tick() {
        let mut h = harness(UnlockPolicy::ExplicitClear);
        h.classifier.push(2, 0.1);
        h.classifier.push(2, 0.1);
        h.commands.send(Command::Clear).expect("send");
        h.commands.send(Command::Quit).expect("send");

        assert_eq!(h.control.tick().expect("tick"), TickOutcome::Continue);
        assert_eq!(h.control.tick().expect("tick"), TickOutcome::Quit);
    }

    #[test]
    fn quit_skips_classification_and_render() {
        let mut h = harness(UnlockPolicy::ExplicitClear);
        h.commands.send(Command::Quit).expect("send");
        assert_eq!(h.control.tick().expect("tick"), TickOutcome::Quit);
        assert_eq!(h.classifier.calls(), 0);
        assert!(h.display.frames.lock().expect("frames").is_empty());
    }

    #[test]
    fn resume_drawing_policy_unlocks_when_pen_returns() {
        let mut h = harness(UnlockPolicy::ResumeDrawing);
        h.classifier.push(5, 0.9);
        h.control.tick().expect("tick");
        assert_eq!(h.control.gate_state(), GateState::Locked);

        h.canvas.set_pen_down((1, 1));
        h.classifier.push(6, 0.4);
        h.control.tick().expect("tick");
        assert_eq!(h.control.gate_state(), GateState::Active);
        assert_eq!(h.control.prediction().digit(), 6);
    }

    #[test]
    fn classification_failure_propagates_and_closes_display() {
        let h = harness(UnlockPolicy::ExplicitClear);
        h.classifier.push_failure();
        let err = h.control.run().expect_err("failure propagates");
        assert!(format!("{err:#}").contains("inference failed"));
        assert!(*h.display.closed.lock().expect("closed"));
    }

    #[test]
    fn dropped_sender_stops_the_loop_cleanly() {
        let Harness {
            control,
            commands,
            display,
            ..
        } = harness(UnlockPolicy::ExplicitClear);
        drop(commands);
        control.run().expect("clean stop");
        assert!(*display.closed.lock().expect("closed"));
    }
}
