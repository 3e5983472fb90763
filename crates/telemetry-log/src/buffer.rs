//! Frames waiting to be written.

use chrono::{DateTime, Local};
use motor_telemetry_frame::FrameBatch;
use tracing::debug;

use crate::policy::LoggingPolicy;

/// A batch captured for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub captured_at: DateTime<Local>,
    pub batch: FrameBatch,
}

/// Admission-ordered backlog of [`LogEntry`] values.
///
/// Capture timestamps never decrease, even across exports: a clock step
/// backwards is clamped to the last admitted timestamp.
#[derive(Debug, Default)]
pub struct LogBuffer {
    entries: Vec<LogEntry>,
    last_captured_at: Option<DateTime<Local>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `batch` if `policy` admits it, returning whether it was buffered.
    pub fn admit(
        &mut self,
        batch: FrameBatch,
        policy: LoggingPolicy,
        any_unit_has_error: bool,
        captured_at: DateTime<Local>,
    ) -> bool {
        if !policy.admits(any_unit_has_error) {
            return false;
        }

        let captured_at = match self.last_captured_at {
            Some(last) if captured_at < last => {
                debug!(%captured_at, %last, "Clamping log timestamp that went backwards");
                last
            }
            _ => captured_at,
        };
        self.last_captured_at = Some(captured_at);
        self.entries.push(LogEntry { captured_at, batch });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Capture time of the oldest pending entry.
    pub fn first_captured_at(&self) -> Option<DateTime<Local>> {
        self.entries.first().map(|entry| entry.captured_at)
    }

    /// Drop every pending entry. Only called after a successful write.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use motor_telemetry_frame::MotorFrame;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn base_time() -> Result<DateTime<Local>, Box<dyn std::error::Error>> {
        Ok(Local
            .with_ymd_and_hms(2025, 4, 3, 13, 0, 0)
            .single()
            .ok_or("ambiguous local time")?)
    }

    fn batch(error_code: f64) -> FrameBatch {
        FrameBatch::new(vec![MotorFrame {
            error_code,
            ..MotorFrame::default()
        }])
    }

    #[test]
    fn continuous_buffers_every_batch() -> TestResult {
        let start = base_time()?;
        let mut buffer = LogBuffer::new();
        for i in 0..100 {
            let admitted = buffer.admit(
                batch(0.0),
                LoggingPolicy::Continuous,
                false,
                start + Duration::milliseconds(20 * i),
            );
            assert!(admitted);
        }
        assert_eq!(buffer.len(), 100);
        Ok(())
    }

    #[test]
    fn error_triggered_drops_clean_batches() -> TestResult {
        let now = base_time()?;
        let mut buffer = LogBuffer::new();

        assert!(!buffer.admit(batch(0.0), LoggingPolicy::ErrorTriggered, false, now));
        assert!(buffer.admit(batch(3.0), LoggingPolicy::ErrorTriggered, true, now));
        assert_eq!(buffer.len(), 1);
        Ok(())
    }

    #[test]
    fn timestamps_never_go_backwards() -> TestResult {
        let start = base_time()?;
        let mut buffer = LogBuffer::new();

        buffer.admit(batch(0.0), LoggingPolicy::Continuous, false, start);
        buffer.admit(
            batch(0.0),
            LoggingPolicy::Continuous,
            false,
            start - Duration::seconds(30),
        );
        buffer.admit(
            batch(0.0),
            LoggingPolicy::Continuous,
            false,
            start + Duration::seconds(1),
        );

        let stamps: Vec<_> = buffer.entries().iter().map(|e| e.captured_at).collect();
        assert_eq!(stamps, vec![start, start, start + Duration::seconds(1)]);
        Ok(())
    }

    #[test]
    fn clamp_survives_clear() -> TestResult {
        let start = base_time()?;
        let mut buffer = LogBuffer::new();
        buffer.admit(batch(0.0), LoggingPolicy::Continuous, false, start);
        buffer.clear();

        buffer.admit(
            batch(0.0),
            LoggingPolicy::Continuous,
            false,
            start - Duration::seconds(5),
        );
        assert_eq!(buffer.first_captured_at(), Some(start));
        Ok(())
    }
}
