//! Last-known error code per motor.

use motor_telemetry_frame::FrameBatch;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::kind::MotorErrorKind;

/// Change of a motor's error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTransition {
    pub unit_id: usize,
    /// `None` on the first observation of the motor.
    pub previous_code: Option<i64>,
    pub code: i64,
    pub kind: MotorErrorKind,
}

impl ErrorTransition {
    pub fn category(&self) -> &'static str {
        self.kind.description()
    }

    /// True when the motor went from healthy (or unseen) into a fault.
    pub fn is_fault_onset(&self) -> bool {
        self.kind.is_fault()
            && self
                .previous_code
                .is_none_or(|previous| !MotorErrorKind::from_code(previous).is_fault())
    }

    /// True when the motor returned to code 0 after a fault.
    pub fn is_recovery(&self) -> bool {
        !self.kind.is_fault()
            && self
                .previous_code
                .is_some_and(|previous| MotorErrorKind::from_code(previous).is_fault())
    }
}

/// Error state of one motor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorState {
    /// No frame has been seen for this motor yet.
    #[default]
    Uninitialized,
    Initialized(i64),
}

impl ErrorState {
    pub fn last_code(&self) -> Option<i64> {
        match self {
            ErrorState::Uninitialized => None,
            ErrorState::Initialized(code) => Some(*code),
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self, ErrorState::Initialized(_))
    }
}

/// Edge-triggered tracker over a fixed set of motors.
#[derive(Debug, Clone)]
pub struct ErrorStateTracker {
    states: Vec<ErrorState>,
}

impl ErrorStateTracker {
    pub fn new(unit_count: usize) -> Self {
        Self {
            states: vec![ErrorState::Uninitialized; unit_count],
        }
    }

    pub fn unit_count(&self) -> usize {
        self.states.len()
    }

    /// Record `code` for `unit_id`, returning a transition if the code changed.
    ///
    /// An unseen motor is assumed healthy: a first update with code 0 only
    /// initializes the state, while a first nonzero code reports a transition
    /// with no previous code. Updates for a motor outside the tracked range
    /// are ignored with a warning.
    pub fn update(&mut self, unit_id: usize, code: i64) -> Option<ErrorTransition> {
        let Some(state) = self.states.get_mut(unit_id) else {
            warn!(
                unit_id,
                unit_count = self.states.len(),
                "Ignoring error code for untracked motor"
            );
            return None;
        };

        let previous_code = state.last_code();
        let baseline = previous_code.unwrap_or(0);
        *state = ErrorState::Initialized(code);
        if baseline == code {
            return None;
        }

        let transition = ErrorTransition {
            unit_id,
            previous_code,
            code,
            kind: MotorErrorKind::from_code(code),
        };
        debug!(
            unit_id,
            previous_code = ?previous_code,
            code,
            category = transition.category(),
            "Motor error state changed"
        );
        Some(transition)
    }

    /// Update every motor from one batch, in unit order.
    pub fn observe_batch(&mut self, batch: &FrameBatch) -> Vec<ErrorTransition> {
        batch
            .iter()
            .enumerate()
            .filter_map(|(unit_id, frame)| self.update(unit_id, frame.error_code()))
            .collect()
    }

    pub fn state(&self, unit_id: usize) -> Option<ErrorState> {
        self.states.get(unit_id).copied()
    }

    pub fn states(&self) -> &[ErrorState] {
        &self.states
    }

    /// Motors whose last known code is a fault.
    pub fn faulted_units(&self) -> Vec<usize> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(unit_id, state)| {
                state
                    .last_code()
                    .filter(|code| MotorErrorKind::from_code(*code).is_fault())
                    .map(|_| unit_id)
            })
            .collect()
    }
}
