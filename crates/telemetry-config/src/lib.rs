//! Configuration for the motor telemetry monitor.
//!
//! The configuration is a single JSON document. Missing keys take their
//! defaults, and a missing file is replaced by a freshly written default.

#![deny(static_mut_refs)]

mod error;
mod monitor;

pub use error::ConfigError;
pub use monitor::{CONFIG_PATH_ENV, CURRENT_SCHEMA_VERSION, DEFAULT_LOG_DIR, MonitorConfig};
