//! Logging policies and log file naming.

use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `strftime` format of timestamps in frame headers and file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Which batches are written to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingPolicy {
    /// Log only batches where at least one motor reports an error.
    #[default]
    ErrorTriggered,
    /// Log every batch.
    Continuous,
}

impl LoggingPolicy {
    /// Whether a batch is buffered under this policy.
    pub const fn admits(self, any_unit_has_error: bool) -> bool {
        match self {
            LoggingPolicy::Continuous => true,
            LoggingPolicy::ErrorTriggered => any_unit_has_error,
        }
    }

    pub const fn file_prefix(self) -> &'static str {
        match self {
            LoggingPolicy::Continuous => "full_log",
            LoggingPolicy::ErrorTriggered => "motor_error_log",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            LoggingPolicy::Continuous => "continuous",
            LoggingPolicy::ErrorTriggered => "error_triggered",
        }
    }

    /// Compact encoding for lock-free storage.
    pub const fn as_u8(self) -> u8 {
        match self {
            LoggingPolicy::ErrorTriggered => 0,
            LoggingPolicy::Continuous => 1,
        }
    }

    /// Inverse of [`LoggingPolicy::as_u8`]. Unknown values fall back to the default.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => LoggingPolicy::Continuous,
            _ => LoggingPolicy::ErrorTriggered,
        }
    }
}

impl fmt::Display for LoggingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown logging policy: {0}")]
pub struct UnknownPolicy(pub String);

impl FromStr for LoggingPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" | "full" => Ok(LoggingPolicy::Continuous),
            "error_triggered" | "error-triggered" | "error" => Ok(LoggingPolicy::ErrorTriggered),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Whether the buffer should be flushed after this batch.
///
/// Continuous logging flushes every batch. Error-triggered logging flushes as
/// soon as an error is seen rather than waiting for the episode to end.
pub const fn should_export(policy: LoggingPolicy, any_unit_has_error: bool) -> bool {
    matches!(policy, LoggingPolicy::Continuous) || any_unit_has_error
}

/// File name for a log segment or episode starting at `episode_start`.
pub fn log_file_name(policy: LoggingPolicy, episode_start: &DateTime<Local>) -> String {
    format!(
        "{}_{}.txt",
        policy.file_prefix(),
        episode_start.format(TIMESTAMP_FORMAT)
    )
}
