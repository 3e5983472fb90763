//! Plain-text rendering of log entries.
//!
//! ```text
//! ===== Frame [2025-04-03-13-00-12] =====
//! Motor[0]
//!   Mode           : 1.0000
//!   Index          : 0.0000
//!   Torque         : 0.2500 N·m
//!   ...
//!   Mos Temperature: 41.0000
//! ------------------------------
//!
//! ```

use core::fmt;

use motor_telemetry_frame::{MotorField, MotorFrame};

use crate::buffer::LogEntry;
use crate::policy::TIMESTAMP_FORMAT;

/// Line closing each motor block.
pub const FRAME_SEPARATOR: &str = "------------------------------";

const LABEL_WIDTH: usize = 15;

/// Render one entry: a header line, one block per motor and a trailing blank line.
pub fn render_entry(entry: &LogEntry) -> String {
    entry.to_string()
}

/// Render entries in order, ready to be appended to a log file.
pub fn render_entries(entries: &[LogEntry]) -> String {
    entries.iter().map(render_entry).collect()
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "===== Frame [{}] =====",
            self.captured_at.format(TIMESTAMP_FORMAT)
        )?;
        for (unit_id, frame) in self.batch.iter().enumerate() {
            write_motor(f, unit_id, frame)?;
        }
        writeln!(f)
    }
}

fn write_motor(f: &mut fmt::Formatter<'_>, unit_id: usize, frame: &MotorFrame) -> fmt::Result {
    writeln!(f, "Motor[{unit_id}]")?;
    for field in MotorField::ALL {
        writeln!(
            f,
            "  {:<width$}: {:.4}{}",
            field.log_label(),
            frame.get(field),
            field.unit_suffix(),
            width = LABEL_WIDTH,
        )?;
    }
    writeln!(f, "{FRAME_SEPARATOR}")
}
