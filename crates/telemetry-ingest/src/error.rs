use std::io;
use std::net::SocketAddr;

use motor_telemetry_config::ConfigError;
use motor_telemetry_frame::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("pipeline is already running")]
    AlreadyRunning,

    #[error("failed to bind UDP socket on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("expected {expected} motor rows, got {actual}")]
    RowCount { expected: usize, actual: usize },

    #[error("motor {unit_id}: expected {expected} values, got {actual}")]
    RowWidth {
        unit_id: usize,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
