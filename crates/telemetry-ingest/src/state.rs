//! Last known projected values, shared by the ingestion and notifier tasks.

use motor_telemetry_frame::{FieldSelection, FrameBatch};
use parking_lot::Mutex;
use tracing::warn;

use crate::error::IngestError;
use crate::sink::TelemetrySink;

#[derive(Debug)]
struct Values {
    rows: Vec<Vec<f64>>,
    populated: bool,
}

/// `unit_count x fields` matrix of the latest projected values.
#[derive(Debug)]
pub struct FrameState {
    selection: FieldSelection,
    unit_count: usize,
    series_names: Vec<String>,
    values: Mutex<Values>,
}

impl FrameState {
    pub fn new(unit_count: usize, selection: FieldSelection) -> Self {
        let fields = selection.projected_len();
        Self {
            series_names: selection.series_names(unit_count),
            unit_count,
            selection,
            values: Mutex::new(Values {
                rows: vec![vec![0.0; fields]; unit_count],
                populated: false,
            }),
        }
    }

    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    /// Values per motor.
    pub fn fields_per_unit(&self) -> usize {
        self.selection.projected_len()
    }

    pub fn selection(&self) -> &FieldSelection {
        &self.selection
    }

    /// Series names, unit-major, matching the value layout.
    pub fn series_names(&self) -> &[String] {
        &self.series_names
    }

    /// Whether any values have been stored yet.
    pub fn is_populated(&self) -> bool {
        self.values.lock().populated
    }

    pub fn snapshot(&self) -> Vec<Vec<f64>> {
        self.values.lock().rows.clone()
    }

    /// Project `batch` and publish the result.
    ///
    /// Motors missing from the batch keep their previous values.
    pub fn update_from_batch(
        &self,
        batch: &FrameBatch,
        sink: &dyn TelemetrySink,
        timestamp_s: f64,
    ) {
        let mut values = self.values.lock();
        for (row, frame) in values.rows.iter_mut().zip(batch.iter()) {
            *row = self.selection.project(frame);
        }
        values.populated = true;
        self.publish_locked(&values, sink, timestamp_s);
    }

    /// Replace the stored values with an already projected matrix.
    ///
    /// # Errors
    ///
    /// Rejects a matrix whose shape differs from `unit_count x fields_per_unit`;
    /// the previous values are kept.
    pub fn set_data(&self, data: Vec<Vec<f64>>) -> Result<(), IngestError> {
        if let Err(err) = self.check_shape(&data) {
            warn!(error = %err, "Rejecting frame data with wrong shape");
            return Err(err);
        }

        let mut values = self.values.lock();
        values.rows = data;
        values.populated = true;
        Ok(())
    }

    /// Re-publish the stored values, if any.
    pub fn publish(&self, sink: &dyn TelemetrySink, timestamp_s: f64) -> bool {
        let values = self.values.lock();
        if !values.populated {
            return false;
        }
        self.publish_locked(&values, sink, timestamp_s);
        true
    }

    fn publish_locked(&self, values: &Values, sink: &dyn TelemetrySink, timestamp_s: f64) {
        let flat = values.rows.iter().flat_map(|row| row.iter().copied());
        for (name, value) in self.series_names.iter().zip(flat) {
            sink.append(name, timestamp_s, value);
        }
    }

    fn check_shape(&self, data: &[Vec<f64>]) -> Result<(), IngestError> {
        if data.len() != self.unit_count {
            return Err(IngestError::RowCount {
                expected: self.unit_count,
                actual: data.len(),
            });
        }
        let expected = self.fields_per_unit();
        match data.iter().position(|row| row.len() != expected) {
            Some(unit_id) => Err(IngestError::RowWidth {
                unit_id,
                expected,
                actual: data.get(unit_id).map_or(0, Vec::len),
            }),
            None => Ok(()),
        }
    }
}
