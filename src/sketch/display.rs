use crate::sketch::model::{Grid, Prediction};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Visual state of the overlay label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTone {
    Waiting,
    Live,
    Final,
}

impl LabelTone {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            LabelTone::Waiting => [255, 255, 255],
            LabelTone::Live => [0, 255, 0],
            LabelTone::Final => [255, 255, 0],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub grid: Grid,
    pub prediction: Prediction,
    pub locked: bool,
}

impl Frame {
    pub fn label(&self) -> String {
        overlay_label(&self.prediction, self.locked)
    }

    pub fn tone(&self) -> LabelTone {
        if self.prediction.is_none() {
            LabelTone::Waiting
        } else if self.locked {
            LabelTone::Final
        } else {
            LabelTone::Live
        }
    }
}

pub fn overlay_label(prediction: &Prediction, locked: bool) -> String {
    if prediction.is_none() {
        return "Drawing...".to_string();
    }
    let prefix = if locked { "Final" } else { "Pred" };
    format!(
        "{prefix}: {} ({:.2})",
        prediction.digit(),
        prediction.confidence()
    )
}

pub trait DisplaySink: Send {
    fn present(&mut self, frame: Frame) -> Result<()>;

    /// Called once when the control loop stops, whatever the reason.
    fn close(&mut self) {}
}

#[derive(Debug, Default)]
struct DisplaySlot {
    latest: Mutex<Option<Frame>>,
    generation: AtomicU64,
    closed: AtomicBool,
}

/// Hands the newest frame from the control loop to the window thread. Only
/// the most recent frame is kept; the window picks it up on its next repaint.
#[derive(Debug, Clone, Default)]
pub struct SharedDisplay {
    slot: Arc<DisplaySlot>,
}

impl SharedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest frame together with its generation counter so the
    /// caller can skip re-uploading unchanged frames.
    pub fn latest(&self) -> Option<(u64, Frame)> {
        let guard = self
            .slot
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let frame = guard.clone()?;
        Some((self.slot.generation.load(Ordering::Acquire), frame))
    }

    pub fn generation(&self) -> u64 {
        self.slot.generation.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.slot.closed.load(Ordering::Acquire)
    }
}

impl DisplaySink for SharedDisplay {
    fn present(&mut self, frame: Frame) -> Result<()> {
        let mut guard = self
            .slot
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(frame);
        self.slot.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn close(&mut self) {
        self.slot.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(prediction: Prediction, locked: bool) -> Frame {
        Frame {
            grid: Grid::new(2, 2),
            prediction,
            locked,
        }
    }

    #[test]
    fn label_text_follows_overlay_contract() {
        let pred = Prediction::new(7, 0.876).expect("prediction");
        assert_eq!(overlay_label(&Prediction::NONE, false), "Drawing...");
        assert_eq!(overlay_label(&Prediction::NONE, true), "Drawing...");
        assert_eq!(overlay_label(&pred, false), "Pred: 7 (0.88)");
        assert_eq!(overlay_label(&pred, true), "Final: 7 (0.88)");
    }

    #[test]
    fn tone_tracks_prediction_and_lock() {
        let pred = Prediction::new(1, 0.5).expect("prediction");
        assert_eq!(frame(Prediction::NONE, false).tone(), LabelTone::Waiting);
        assert_eq!(frame(pred, false).tone(), LabelTone::Live);
        assert_eq!(frame(pred, true).tone(), LabelTone::Final);
    }

    #[test]
    fn shared_display_keeps_only_latest_frame() {
        let mut sink = SharedDisplay::new();
        let reader = sink.clone();
        assert!(reader.latest().is_none());

        sink.present(frame(Prediction::NONE, false)).expect("present");
        let pred = Prediction::new(4, 0.9).expect("prediction");
        sink.present(frame(pred, true)).expect("present");

        let (generation, latest) = reader.latest().expect("frame");
        assert_eq!(generation, 2);
        assert_eq!(latest.label(), "Final: 4 (0.90)");
        assert!(!reader.is_closed());

        sink.close();
        assert!(reader.is_closed());
    }
}
