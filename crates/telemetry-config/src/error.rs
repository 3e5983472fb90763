use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize config")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write config file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create log directory {}", .path.display())]
    CreateLogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no config location: neither MOTOR_MONITOR_CONFIG nor {0} is set")]
    NoConfigLocation(&'static str),

    #[error("unsupported config schema version: {0}")]
    UnsupportedSchema(String),

    #[error("unit_count must be at least 1")]
    NoUnits,

    #[error("fields_per_unit must be between 1 and {max}, got {actual}")]
    InvalidFieldsPerUnit { actual: usize, max: usize },

    #[error("selected_fields must name at least one field")]
    EmptySelection,

    #[error("refresh_rate_hz must be between 1 and 1000, got {0}")]
    InvalidRefreshRate(u32),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("series_capacity must be greater than zero")]
    ZeroSeriesCapacity,
}
