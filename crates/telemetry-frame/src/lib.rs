//! Motor telemetry frames and the fixed-layout datagram codec.
//!
//! Every datagram carries one record per motor. A record is thirteen 8-byte
//! floats in a fixed order, 104 bytes with no padding:
//!
//! | Field              | Offset | Series label      |
//! |--------------------|--------|-------------------|
//! | mode               | 0      | `Mode`            |
//! | index              | 8      | `Index`           |
//! | torque             | 16     | `Torque`          |
//! | position           | 24     | `Pos`             |
//! | velocity           | 32     | `Vel`             |
//! | position setpoint  | 40     | `Pos_des`         |
//! | velocity setpoint  | 48     | `Vel_des`         |
//! | kp                 | 56     | `Kp`              |
//! | kd                 | 64     | `Kd`              |
//! | feedforward        | 72     | `FF`              |
//! | error code         | 80     | `Error`           |
//! | temperature        | 88     | `Temperature`     |
//! | MOS temperature    | 96     | `Mos Temperature` |
//!
//! The order is a wire contract with the sender. Changing it means changing
//! [`MotorField`], and nothing else, since decoding, projection, and series
//! naming are all driven from that table.
//!
//! # Usage
//!
//! ```rust
//! use motor_telemetry_frame::{FieldSelection, FrameBatch, FrameCodec, MotorFrame};
//!
//! # fn main() -> Result<(), motor_telemetry_frame::DecodeError> {
//! let codec = FrameCodec::new(2);
//! let batch = FrameBatch::new(vec![MotorFrame::default(); 2]);
//! let wire = codec.encode(&batch);
//!
//! let decoded = codec.decode(&wire)?;
//! assert_eq!(decoded.len(), 2);
//!
//! let values = FieldSelection::plot_default().project(&decoded.frames()[0]);
//! assert_eq!(values.len(), 6);
//! # Ok(())
//! # }
//! ```

#![deny(static_mut_refs)]

pub mod codec;
pub mod field;
pub mod frame;
pub mod selection;

pub use codec::{ByteOrder, DecodeError, FrameCodec, decode};
pub use field::{FIELD_COUNT, FIELD_WIDTH, MOTOR_RECORD_SIZE, MotorField, UnknownField};
pub use frame::{
    DEFAULT_UNIT_COUNT, FrameBatch, MotorFrame, UNREADABLE_ERROR_CODE, error_code_from_raw,
};
pub use selection::{FieldSelection, project, series_name};
