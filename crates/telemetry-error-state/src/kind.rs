//! Classification of driver error codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Known driver error codes. Code 5 is unassigned by the driver firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorErrorKind {
    /// Code 0.
    NoError,
    /// Code 1.
    Overheat,
    /// Code 2.
    Overcurrent,
    /// Code 3.
    Undervoltage,
    /// Code 4.
    EncoderFault,
    /// Code 6.
    BrakeOvervoltage,
    /// Code 7.
    DriverFault,
    /// Any other code, including the unreadable marker.
    Unknown,
}

impl MotorErrorKind {
    /// Classify a code. Never fails: unlisted codes are [`MotorErrorKind::Unknown`].
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => MotorErrorKind::NoError,
            1 => MotorErrorKind::Overheat,
            2 => MotorErrorKind::Overcurrent,
            3 => MotorErrorKind::Undervoltage,
            4 => MotorErrorKind::EncoderFault,
            6 => MotorErrorKind::BrakeOvervoltage,
            7 => MotorErrorKind::DriverFault,
            _ => MotorErrorKind::Unknown,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            MotorErrorKind::NoError => "no error",
            MotorErrorKind::Overheat => "overheat",
            MotorErrorKind::Overcurrent => "overcurrent",
            MotorErrorKind::Undervoltage => "undervoltage",
            MotorErrorKind::EncoderFault => "encoder fault",
            MotorErrorKind::BrakeOvervoltage => "brake overvoltage",
            MotorErrorKind::DriverFault => "driver fault",
            MotorErrorKind::Unknown => "unknown error",
        }
    }

    pub const fn is_fault(self) -> bool {
        !matches!(self, MotorErrorKind::NoError)
    }
}

impl fmt::Display for MotorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Human-readable category for a raw error code.
pub fn category(code: i64) -> &'static str {
    MotorErrorKind::from_code(code).description()
}
