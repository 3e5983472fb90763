//! Receivers of error-state changes.

use motor_telemetry_error_state::ErrorTransition;
use tracing::{info, warn};

/// Notified whenever a motor's error code changes. Never called for
/// steady-state frames.
pub trait ErrorStateListener: Send + Sync {
    fn on_error_transition(&self, transition: &ErrorTransition);
}

impl<F> ErrorStateListener for F
where
    F: Fn(&ErrorTransition) + Send + Sync,
{
    fn on_error_transition(&self, transition: &ErrorTransition) {
        self(transition);
    }
}

/// Reports transitions through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorListener;

impl ErrorStateListener for LoggingErrorListener {
    fn on_error_transition(&self, transition: &ErrorTransition) {
        let motor = transition.unit_id.saturating_add(1);
        if transition.kind.is_fault() {
            warn!(
                motor,
                code = transition.code,
                previous_code = ?transition.previous_code,
                category = transition.category(),
                "Motor reports error"
            );
        } else {
            info!(
                motor,
                previous_code = ?transition.previous_code,
                "Motor error cleared"
            );
        }
    }
}
