//! Per-motor error state with edge-triggered notification.
//!
//! The tracker remembers the last error code seen for every motor and only
//! reports a [`ErrorTransition`] when that code changes. Steady-state frames
//! produce nothing, so listeners only redraw on change.

#![deny(static_mut_refs)]

mod kind;
mod tracker;

pub use kind::{MotorErrorKind, category};
pub use tracker::{ErrorState, ErrorStateTracker, ErrorTransition};
