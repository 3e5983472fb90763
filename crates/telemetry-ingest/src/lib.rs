//! Motor telemetry ingestion.
//!
//! [`MotorTelemetryPipeline`] owns a UDP socket and two background tasks:
//!
//! - the ingestion task receives one datagram per iteration and hands it to an
//!   [`Ingestor`], which decodes it, publishes the projected values to the
//!   [`TelemetrySink`], forwards error transitions to the
//!   [`ErrorStateListener`] and feeds the log recorder, in that order;
//! - the notifier task re-publishes the last known values at the configured
//!   refresh rate so plots keep moving when datagrams are late.
//!
//! Both tasks share a [`FrameState`] whose lock is held only for a single
//! update or publish step, never across a receive.

#![deny(static_mut_refs)]

mod error;
mod ingestor;
mod listener;
mod notifier;
mod pipeline;
mod sink;
mod state;
mod stats;

pub use error::IngestError;
pub use ingestor::{IngestOutputs, Ingestor, ProcessedBatch, seconds_since_epoch};
pub use listener::{ErrorStateListener, LoggingErrorListener};
pub use pipeline::{MotorTelemetryPipeline, TelemetrySource};
pub use sink::{Sample, SeriesStore, TelemetrySink};
pub use state::FrameState;
pub use stats::{IngestStats, IngestStatsSnapshot};
