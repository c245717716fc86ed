use crate::sketch::model::Prediction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Active,
    Locked,
}

impl GateState {
    pub fn is_locked(self) -> bool {
        matches!(self, Self::Locked)
    }
}

/// How a locked prediction is released again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockPolicy {
    /// Only the clear command unlocks.
    #[default]
    ExplicitClear,
    /// Putting the pen back down also unlocks.
    ResumeDrawing,
}

/// What asked the gate to change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTrigger {
    /// The per-tick confidence check.
    Evaluation,
    /// The clear command.
    Clear,
    /// The pen went down while locked.
    PenDown,
}

/// Locking only happens through evaluation. Unlocking happens through clear,
/// or through pen down when the policy allows it.
pub fn can_transition(
    from: GateState,
    to: GateState,
    trigger: GateTrigger,
    policy: UnlockPolicy,
) -> bool {
    match (from, to) {
        (GateState::Active, GateState::Locked) => trigger == GateTrigger::Evaluation,
        (GateState::Locked, GateState::Active) => match trigger {
            GateTrigger::Clear => true,
            GateTrigger::PenDown => policy == UnlockPolicy::ResumeDrawing,
            GateTrigger::Evaluation => false,
        },
        _ => true,
    }
}

/// Decides whether a fresh classification runs and whether its result may
/// replace the displayed one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gate {
    state: GateState,
    policy: UnlockPolicy,
}

impl Gate {
    pub fn new(policy: UnlockPolicy) -> Self {
        Self {
            state: GateState::Active,
            policy,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn should_classify(&self) -> bool {
        self.state == GateState::Active
    }

    /// Applies the unlock policy for the pen state seen at the start of a
    /// tick. Returns true when the gate was unlocked.
    pub fn observe_drawing(&mut self, user_is_drawing: bool) -> bool {
        let unlock = self.state == GateState::Locked
            && user_is_drawing
            && self.policy == UnlockPolicy::ResumeDrawing;
        if unlock {
            self.set_state(GateState::Active, GateTrigger::PenDown);
        }
        unlock
    }

    /// Runs the transition rule for one tick. Has no effect while locked.
    pub fn evaluate(
        &mut self,
        prediction: &Prediction,
        user_is_drawing: bool,
        confidence_threshold: f32,
    ) -> GateState {
        if self.state == GateState::Active
            && prediction.confidence() >= confidence_threshold
            && !user_is_drawing
        {
            self.set_state(GateState::Locked, GateTrigger::Evaluation);
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.set_state(GateState::Active, GateTrigger::Clear);
    }

    fn set_state(&mut self, next: GateState, trigger: GateTrigger) {
        debug_assert!(
            can_transition(self.state, next, trigger, self.policy),
            "gate {:?} -> {next:?} via {trigger:?} under {:?}",
            self.state,
            self.policy
        );
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, ?trigger, "gate transition");
        }
        self.state = next;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(UnlockPolicy::default())
    }
}
