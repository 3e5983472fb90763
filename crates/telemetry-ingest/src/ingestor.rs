//! Processing of a single datagram.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use motor_telemetry_config::MonitorConfig;
use motor_telemetry_error_state::{ErrorStateTracker, ErrorTransition};
use motor_telemetry_frame::{FrameBatch, FrameCodec};
use motor_telemetry_log::{ExportError, ExportReport, LogRecorder, LogSink, LoggingPolicy};
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::listener::ErrorStateListener;
use crate::sink::TelemetrySink;
use crate::state::FrameState;
use crate::stats::IngestStats;

/// Shared destinations an [`Ingestor`] writes to.
#[derive(Clone)]
pub struct IngestOutputs {
    pub state: Arc<FrameState>,
    pub sink: Arc<dyn TelemetrySink>,
    pub listener: Arc<dyn ErrorStateListener>,
    pub stats: Arc<IngestStats>,
}

/// Everything one accepted datagram produced.
#[derive(Debug)]
pub struct ProcessedBatch {
    pub batch: FrameBatch,
    pub transitions: Vec<ErrorTransition>,
    pub any_unit_has_error: bool,
    /// Whether the batch entered the log buffer.
    pub logged: bool,
    pub exported: Option<ExportReport>,
    /// Set when an export was attempted and failed; entries stay buffered.
    pub export_error: Option<ExportError>,
}

/// Decode, publish, track and log, one datagram at a time.
pub struct Ingestor<S = Box<dyn LogSink>> {
    codec: FrameCodec,
    tracker: ErrorStateTracker,
    recorder: LogRecorder<S>,
    outputs: IngestOutputs,
}

impl<S: LogSink> Ingestor<S> {
    pub fn new(config: &MonitorConfig, log_sink: S, outputs: IngestOutputs) -> Self {
        Self {
            codec: config.codec(),
            tracker: ErrorStateTracker::new(config.unit_count),
            recorder: LogRecorder::with_sink(config.log_dir.clone(), log_sink),
            outputs,
        }
    }

    /// Datagram size this ingestor accepts.
    pub fn expected_len(&self) -> usize {
        self.codec.expected_len()
    }

    pub fn tracker(&self) -> &ErrorStateTracker {
        &self.tracker
    }

    pub fn recorder(&self) -> &LogRecorder<S> {
        &self.recorder
    }

    /// Run one datagram through the pipeline.
    ///
    /// The sink is updated before the error tracker, and the tracker before the
    /// log recorder. Export failures are reported in the result, not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Decode`] for a datagram of the wrong size. Nothing
    /// else is touched in that case.
    pub fn process_datagram(
        &mut self,
        datagram: &[u8],
        policy: LoggingPolicy,
        now: DateTime<Local>,
    ) -> Result<ProcessedBatch, IngestError> {
        let stats = &self.outputs.stats;
        stats.record_received();

        let batch = match self.codec.decode(datagram) {
            Ok(batch) => batch,
            Err(err) => {
                stats.record_rejected();
                warn!(
                    expected = self.codec.expected_len(),
                    actual = datagram.len(),
                    "Dropping motor telemetry datagram: {err}"
                );
                return Err(err.into());
            }
        };
        stats.record_decoded();

        self.outputs.state.update_from_batch(
            &batch,
            self.outputs.sink.as_ref(),
            seconds_since_epoch(&now),
        );

        let transitions = self.tracker.observe_batch(&batch);
        for transition in &transitions {
            self.outputs.listener.on_error_transition(transition);
        }
        stats.record_transitions(transitions.len());

        let any_unit_has_error = batch.any_unit_has_error();
        let (logged, exported, export_error) =
            match self
                .recorder
                .record(batch.clone(), policy, any_unit_has_error, now)
            {
                Ok(outcome) => (outcome.admitted, outcome.exported, None),
                Err(err) => {
                    stats.record_failed_export();
                    // The batch was admitted before the export was attempted.
                    (policy.admits(any_unit_has_error), None, Some(err))
                }
            };
        if logged {
            stats.record_logged();
        }
        if let Some(report) = &exported {
            stats.record_exported(report.entries);
        }

        debug!(
            units = batch.len(),
            transitions = transitions.len(),
            any_unit_has_error,
            logged,
            "Processed motor telemetry datagram"
        );

        Ok(ProcessedBatch {
            batch,
            transitions,
            any_unit_has_error,
            logged,
            exported,
            export_error,
        })
    }
}

/// Wall-clock time as fractional seconds since the Unix epoch.
pub fn seconds_since_epoch<Tz: TimeZone>(at: &DateTime<Tz>) -> f64 {
    at.clone()
        .signed_duration_since(DateTime::<Utc>::UNIX_EPOCH)
        .to_std()
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}
