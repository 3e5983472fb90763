//! Text logging of motor telemetry frames.
//!
//! Batches pass through a [`LogBuffer`] under a [`LoggingPolicy`]:
//!
//! - [`LoggingPolicy::Continuous`] admits and exports every batch, appending to
//!   one `full_log_<stamp>.txt` file per policy segment.
//! - [`LoggingPolicy::ErrorTriggered`] admits only batches where some motor
//!   reports a nonzero error code, and exports them immediately into one
//!   `motor_error_log_<stamp>.txt` file per error episode.
//!
//! [`LogRecorder`] drives admission and export for one batch at a time. A failed
//! write leaves the buffer untouched and the next batch retries it.

#![deny(static_mut_refs)]

mod buffer;
mod exporter;
mod policy;
mod recorder;
mod render;
mod sink;

pub use buffer::{LogBuffer, LogEntry};
pub use exporter::{ExportError, ExportReport, LogExporter};
pub use policy::{LoggingPolicy, TIMESTAMP_FORMAT, UnknownPolicy, log_file_name, should_export};
pub use recorder::{LogRecorder, RecordOutcome};
pub use render::{FRAME_SEPARATOR, render_entries, render_entry};
pub use sink::{FileSink, LogSink, MemorySink};
