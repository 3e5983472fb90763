//! Decoded motor records and per-datagram batches.

use serde::{Deserialize, Serialize};

use crate::codec::{self, ByteOrder};
use crate::field::{FIELD_COUNT, MotorField};

/// Number of motors carried per datagram in the reference deployment.
pub const DEFAULT_UNIT_COUNT: usize = 13;

/// Code reported for an error field that is NaN or infinite.
pub const UNREADABLE_ERROR_CODE: i64 = -1;

/// Convert the raw floating-point error field into an integer code.
///
/// Rounds half up, so `2.9999` from a lossy sender still reads as `3`.
/// Non-finite values map to [`UNREADABLE_ERROR_CODE`].
pub fn error_code_from_raw(raw: f64) -> i64 {
    if !raw.is_finite() {
        return UNREADABLE_ERROR_CODE;
    }
    (raw + 0.5).floor() as i64
}

/// State of one motor at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorFrame {
    pub mode: f64,
    pub index: f64,
    pub torque: f64,
    pub position: f64,
    pub velocity: f64,
    pub position_setpoint: f64,
    pub velocity_setpoint: f64,
    pub kp: f64,
    pub kd: f64,
    pub feedforward: f64,
    pub error_code: f64,
    pub temperature: f64,
    pub mos_temperature: f64,
}

impl MotorFrame {
    /// Read a single field.
    pub fn get(&self, field: MotorField) -> f64 {
        match field {
            MotorField::Mode => self.mode,
            MotorField::Index => self.index,
            MotorField::Torque => self.torque,
            MotorField::Position => self.position,
            MotorField::Velocity => self.velocity,
            MotorField::PositionSetpoint => self.position_setpoint,
            MotorField::VelocitySetpoint => self.velocity_setpoint,
            MotorField::Kp => self.kp,
            MotorField::Kd => self.kd,
            MotorField::Feedforward => self.feedforward,
            MotorField::ErrorCode => self.error_code,
            MotorField::Temperature => self.temperature,
            MotorField::MosTemperature => self.mos_temperature,
        }
    }

    /// Overwrite a single field.
    pub fn set(&mut self, field: MotorField, value: f64) {
        let slot = match field {
            MotorField::Mode => &mut self.mode,
            MotorField::Index => &mut self.index,
            MotorField::Torque => &mut self.torque,
            MotorField::Position => &mut self.position,
            MotorField::Velocity => &mut self.velocity,
            MotorField::PositionSetpoint => &mut self.position_setpoint,
            MotorField::VelocitySetpoint => &mut self.velocity_setpoint,
            MotorField::Kp => &mut self.kp,
            MotorField::Kd => &mut self.kd,
            MotorField::Feedforward => &mut self.feedforward,
            MotorField::ErrorCode => &mut self.error_code,
            MotorField::Temperature => &mut self.temperature,
            MotorField::MosTemperature => &mut self.mos_temperature,
        };
        *slot = value;
    }

    /// Build a frame from values given in wire order.
    pub fn from_array(values: [f64; FIELD_COUNT]) -> Self {
        let mut frame = MotorFrame::default();
        for (field, value) in MotorField::ALL.into_iter().zip(values) {
            frame.set(field, value);
        }
        frame
    }

    /// All values in wire order.
    pub fn to_array(&self) -> [f64; FIELD_COUNT] {
        MotorField::ALL.map(|field| self.get(field))
    }

    /// Integer error code, see [`error_code_from_raw`].
    pub fn error_code(&self) -> i64 {
        error_code_from_raw(self.error_code)
    }

    /// Whether the raw error field is anything but zero.
    ///
    /// Fractional and NaN values count as errors even when
    /// [`MotorFrame::error_code`] rounds them to `0`.
    pub fn has_error(&self) -> bool {
        self.error_code.is_nan() || self.error_code.abs() > 0.0
    }
}

/// All motor records decoded from one datagram, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameBatch {
    frames: Vec<MotorFrame>,
}

impl FrameBatch {
    pub fn new(frames: Vec<MotorFrame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[MotorFrame] {
        &self.frames
    }

    /// Record for `unit_id`, if the batch has one.
    pub fn get(&self, unit_id: usize) -> Option<&MotorFrame> {
        self.frames.get(unit_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MotorFrame> {
        self.frames.iter()
    }

    /// True when at least one motor reports a nonzero raw error field.
    pub fn any_unit_has_error(&self) -> bool {
        self.frames.iter().any(MotorFrame::has_error)
    }

    /// Indices of motors reporting an error.
    pub fn faulted_units(&self) -> impl Iterator<Item = usize> + '_ {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.has_error())
            .map(|(unit_id, _)| unit_id)
    }

    /// Serialize the batch into the packed wire layout.
    pub fn encode(&self, order: ByteOrder) -> Vec<u8> {
        codec::encode_frames(&self.frames, order)
    }

    pub fn into_frames(self) -> Vec<MotorFrame> {
        self.frames
    }
}

impl<'a> IntoIterator for &'a FrameBatch {
    type Item = &'a MotorFrame;
    type IntoIter = std::slice::Iter<'a, MotorFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_rounds_half_up() {
        assert_eq!(error_code_from_raw(0.0), 0);
        assert_eq!(error_code_from_raw(0.49), 0);
        assert_eq!(error_code_from_raw(2.5), 3);
        assert_eq!(error_code_from_raw(6.9999), 7);
        assert_eq!(error_code_from_raw(-0.2), 0);
    }

    #[test]
    fn non_finite_error_code_is_unreadable() {
        assert_eq!(error_code_from_raw(f64::NAN), UNREADABLE_ERROR_CODE);
        assert_eq!(error_code_from_raw(f64::INFINITY), UNREADABLE_ERROR_CODE);
    }

    #[test]
    fn array_conversion_follows_wire_order() {
        let values: [f64; FIELD_COUNT] = core::array::from_fn(|i| i as f64 * 1.5);
        let frame = MotorFrame::from_array(values);

        assert_eq!(frame.mode.to_bits(), 0.0f64.to_bits());
        assert_eq!(frame.torque.to_bits(), 3.0f64.to_bits());
        assert_eq!(frame.position.to_bits(), 4.5f64.to_bits());
        assert_eq!(frame.mos_temperature.to_bits(), 18.0f64.to_bits());
        assert_eq!(frame.to_array().map(f64::to_bits), values.map(f64::to_bits));
    }

    #[test]
    fn batch_reports_faulted_units() {
        let mut frames = vec![MotorFrame::default(); 4];
        if let Some(frame) = frames.get_mut(2) {
            frame.error_code = 4.0;
        }
        let batch = FrameBatch::new(frames);

        assert!(batch.any_unit_has_error());
        assert_eq!(batch.faulted_units().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn fractional_error_field_counts_as_error() {
        for raw in [0.3, -0.2, f64::NAN] {
            let frame = MotorFrame {
                error_code: raw,
                ..MotorFrame::default()
            };
            assert!(frame.has_error(), "raw {raw}");
        }
        let negative_zero = MotorFrame {
            error_code: -0.0,
            ..MotorFrame::default()
        };
        assert!(!negative_zero.has_error());
    }

    #[test]
    fn clean_batch_has_no_error() {
        let batch = FrameBatch::new(vec![MotorFrame::default(); DEFAULT_UNIT_COUNT]);
        assert!(!batch.any_unit_has_error());
        assert_eq!(batch.faulted_units().count(), 0);
    }
}
