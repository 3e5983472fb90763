//! Field table for the motor record.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Width in bytes of every field on the wire.
pub const FIELD_WIDTH: usize = 8;

/// Number of fields carried per motor record.
pub const FIELD_COUNT: usize = 13;

/// Size in bytes of one motor record on the wire.
pub const MOTOR_RECORD_SIZE: usize = FIELD_COUNT * FIELD_WIDTH;

const _: () = assert!(
    MOTOR_RECORD_SIZE == 104,
    "motor record must stay 104 bytes to match the sender"
);

/// One field of the motor record, declared in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorField {
    /// Control mode. Mode 0 means the motor is commanded to stop.
    Mode,
    /// Motor index as reported by the sender.
    Index,
    /// Measured torque (N·m).
    Torque,
    /// Measured position (rad).
    Position,
    /// Measured velocity (rad/s).
    Velocity,
    /// Commanded position (rad).
    PositionSetpoint,
    /// Commanded velocity (rad/s).
    VelocitySetpoint,
    /// Position gain.
    Kp,
    /// Damping gain.
    Kd,
    /// Feedforward torque (N·m).
    Feedforward,
    /// Driver error code, carried as a float.
    ErrorCode,
    /// Winding temperature.
    Temperature,
    /// MOSFET temperature.
    MosTemperature,
}

impl MotorField {
    /// All fields in wire order.
    pub const ALL: [MotorField; FIELD_COUNT] = [
        MotorField::Mode,
        MotorField::Index,
        MotorField::Torque,
        MotorField::Position,
        MotorField::Velocity,
        MotorField::PositionSetpoint,
        MotorField::VelocitySetpoint,
        MotorField::Kp,
        MotorField::Kd,
        MotorField::Feedforward,
        MotorField::ErrorCode,
        MotorField::Temperature,
        MotorField::MosTemperature,
    ];

    /// Position of the field within the record.
    pub const fn wire_index(self) -> usize {
        self as usize
    }

    /// Byte offset of the field within the record.
    pub const fn offset(self) -> usize {
        self.wire_index() * FIELD_WIDTH
    }

    /// Canonical snake_case name, as used in configuration files.
    pub const fn name(self) -> &'static str {
        match self {
            MotorField::Mode => "mode",
            MotorField::Index => "index",
            MotorField::Torque => "torque",
            MotorField::Position => "position",
            MotorField::Velocity => "velocity",
            MotorField::PositionSetpoint => "position_setpoint",
            MotorField::VelocitySetpoint => "velocity_setpoint",
            MotorField::Kp => "kp",
            MotorField::Kd => "kd",
            MotorField::Feedforward => "feedforward",
            MotorField::ErrorCode => "error_code",
            MotorField::Temperature => "temperature",
            MotorField::MosTemperature => "mos_temperature",
        }
    }

    /// Short label used for time-series names (`Motor3/Pos`).
    pub const fn series_label(self) -> &'static str {
        match self {
            MotorField::Mode => "Mode",
            MotorField::Index => "Index",
            MotorField::Torque => "Torque",
            MotorField::Position => "Pos",
            MotorField::Velocity => "Vel",
            MotorField::PositionSetpoint => "Pos_des",
            MotorField::VelocitySetpoint => "Vel_des",
            MotorField::Kp => "Kp",
            MotorField::Kd => "Kd",
            MotorField::Feedforward => "FF",
            MotorField::ErrorCode => "Error",
            MotorField::Temperature => "Temperature",
            MotorField::MosTemperature => "Mos Temperature",
        }
    }

    /// Human-readable label used in exported log files.
    pub const fn log_label(self) -> &'static str {
        match self {
            MotorField::Mode => "Mode",
            MotorField::Index => "Index",
            MotorField::Torque => "Torque",
            MotorField::Position => "Position",
            MotorField::Velocity => "Velocity",
            MotorField::PositionSetpoint => "Pos_des",
            MotorField::VelocitySetpoint => "Vel_des",
            MotorField::Kp => "Kp",
            MotorField::Kd => "Kd",
            MotorField::Feedforward => "Feedforward",
            MotorField::ErrorCode => "Error",
            MotorField::Temperature => "Temperature",
            MotorField::MosTemperature => "Mos Temperature",
        }
    }

    /// Physical unit appended to values in exported log files.
    pub const fn unit_suffix(self) -> &'static str {
        match self {
            MotorField::Torque | MotorField::Feedforward => " N·m",
            MotorField::Position | MotorField::PositionSetpoint => " rad",
            MotorField::Velocity | MotorField::VelocitySetpoint => " rad/s",
            _ => "",
        }
    }

    /// Look a field up by canonical name or series label, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let field = match name.as_str() {
            "mode" => MotorField::Mode,
            "index" => MotorField::Index,
            "torque" | "tau" => MotorField::Torque,
            "position" | "pos" => MotorField::Position,
            "velocity" | "vel" => MotorField::Velocity,
            "position_setpoint" | "pos_des" => MotorField::PositionSetpoint,
            "velocity_setpoint" | "vel_des" => MotorField::VelocitySetpoint,
            "kp" => MotorField::Kp,
            "kd" => MotorField::Kd,
            "feedforward" | "ff" => MotorField::Feedforward,
            "error_code" | "error" => MotorField::ErrorCode,
            "temperature" => MotorField::Temperature,
            "mos_temperature" | "mos temperature" => MotorField::MosTemperature,
            _ => return None,
        };
        Some(field)
    }
}

impl fmt::Display for MotorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A field name that does not match any [`MotorField`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown motor field: {0:?}")]
pub struct UnknownField(pub String);

impl FromStr for MotorField {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MotorField::from_name(s).ok_or_else(|| UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_contiguous() {
        for (i, field) in MotorField::ALL.iter().enumerate() {
            assert_eq!(field.wire_index(), i);
            assert_eq!(field.offset(), i * FIELD_WIDTH);
        }
        assert_eq!(MotorField::MosTemperature.offset() + FIELD_WIDTH, MOTOR_RECORD_SIZE);
    }

    #[test]
    fn names_round_trip() -> Result<(), UnknownField> {
        for field in MotorField::ALL {
            assert_eq!(field.name().parse::<MotorField>()?, field);
            assert_eq!(field.series_label().parse::<MotorField>()?, field);
        }
        Ok(())
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            "current".parse::<MotorField>(),
            Err(UnknownField("current".to_string()))
        );
    }

    #[test]
    fn serde_uses_snake_case() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&MotorField::MosTemperature)?;
        assert_eq!(json, "\"mos_temperature\"");
        let field: MotorField = serde_json::from_str("\"position_setpoint\"")?;
        assert_eq!(field, MotorField::PositionSetpoint);
        Ok(())
    }
}
