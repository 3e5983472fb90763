//! Per-batch admission and export.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use motor_telemetry_frame::FrameBatch;
use tracing::debug;

use crate::buffer::LogBuffer;
use crate::exporter::{ExportError, ExportReport, LogExporter};
use crate::policy::{LoggingPolicy, should_export};
use crate::sink::{FileSink, LogSink};

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordOutcome {
    pub admitted: bool,
    pub exported: Option<ExportReport>,
}

/// Owns the buffer, exporter and sink for a single ingestion task.
#[derive(Debug)]
pub struct LogRecorder<S = FileSink> {
    buffer: LogBuffer,
    exporter: LogExporter,
    sink: S,
    last_policy: Option<LoggingPolicy>,
}

impl LogRecorder<FileSink> {
    /// Recorder writing files under `log_dir`. The directory must already exist.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self::with_sink(log_dir, FileSink)
    }
}

impl<S: LogSink> LogRecorder<S> {
    pub fn with_sink(log_dir: impl Into<PathBuf>, sink: S) -> Self {
        Self {
            buffer: LogBuffer::new(),
            exporter: LogExporter::new(log_dir),
            sink,
            last_policy: None,
        }
    }

    /// Admit `batch` under `policy` and export when due.
    ///
    /// Export runs when [`should_export`] says so or a previous export failed.
    /// Under [`LoggingPolicy::ErrorTriggered`] the first clean batch after the
    /// backlog has been written closes the episode, so the next error starts
    /// a new file. An error leaves the backlog in place for the next call.
    pub fn record(
        &mut self,
        batch: FrameBatch,
        policy: LoggingPolicy,
        any_unit_has_error: bool,
        captured_at: DateTime<Local>,
    ) -> Result<RecordOutcome, ExportError> {
        if self.last_policy.is_some_and(|last| last != policy) {
            debug!(%policy, "Logging policy changed");
            self.exporter.end_episode();
        }
        self.last_policy = Some(policy);

        let admitted = self
            .buffer
            .admit(batch, policy, any_unit_has_error, captured_at);

        let mut exported = None;
        if should_export(policy, any_unit_has_error) || self.exporter.retry_pending() {
            exported = self
                .exporter
                .export(&mut self.buffer, &mut self.sink, policy)?;
        }

        if policy == LoggingPolicy::ErrorTriggered
            && !any_unit_has_error
            && self.buffer.is_empty()
            && self.exporter.episode_start().is_some()
        {
            self.exporter.end_episode();
        }

        Ok(RecordOutcome { admitted, exported })
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    pub fn exporter(&self) -> &LogExporter {
        &self.exporter
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
