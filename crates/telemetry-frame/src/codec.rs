//! Decoding of raw datagrams into [`FrameBatch`] values.
//!
//! Records are read field by field at fixed offsets. Nothing relies on the
//! in-memory layout of [`MotorFrame`].

use serde::{Deserialize, Serialize};

use crate::field::{FIELD_COUNT, FIELD_WIDTH, MOTOR_RECORD_SIZE, MotorField};
use crate::frame::{FrameBatch, MotorFrame};

/// Byte order shared by sender and receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// Reasons a datagram cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("datagram size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("unit stride of {stride} bytes is smaller than the {MOTOR_RECORD_SIZE}-byte motor record")]
    StrideTooSmall { stride: usize },

    #[error("frame layout of {unit_count} units x {stride} bytes overflows")]
    LayoutOverflow { unit_count: usize, stride: usize },
}

/// Decode `raw` as `unit_count` records spaced `unit_stride` bytes apart.
///
/// The datagram must be exactly `unit_count * unit_stride` bytes; anything
/// else is rejected whole. Bytes past the 104-byte record inside a wider
/// stride are ignored.
///
/// # Errors
///
/// Returns [`DecodeError::SizeMismatch`] for a wrongly sized datagram and
/// [`DecodeError::StrideTooSmall`] / [`DecodeError::LayoutOverflow`] for an
/// unusable layout.
pub fn decode(
    raw: &[u8],
    unit_count: usize,
    unit_stride: usize,
    order: ByteOrder,
) -> Result<FrameBatch, DecodeError> {
    let expected = expected_len(unit_count, unit_stride)?;
    if raw.len() != expected {
        return Err(DecodeError::SizeMismatch {
            expected,
            actual: raw.len(),
        });
    }

    let frames = raw
        .chunks_exact(unit_stride)
        .map(|record| decode_record(record, order))
        .collect::<Option<Vec<_>>>()
        .ok_or(DecodeError::SizeMismatch {
            expected,
            actual: raw.len(),
        })?;

    Ok(FrameBatch::new(frames))
}

fn expected_len(unit_count: usize, unit_stride: usize) -> Result<usize, DecodeError> {
    if unit_stride < MOTOR_RECORD_SIZE {
        return Err(DecodeError::StrideTooSmall {
            stride: unit_stride,
        });
    }
    unit_count
        .checked_mul(unit_stride)
        .ok_or(DecodeError::LayoutOverflow {
            unit_count,
            stride: unit_stride,
        })
}

fn decode_record(record: &[u8], order: ByteOrder) -> Option<MotorFrame> {
    let mut values = [0.0f64; FIELD_COUNT];
    for (field, slot) in MotorField::ALL.into_iter().zip(values.iter_mut()) {
        *slot = read_f64(record, field.offset(), order)?;
    }
    Some(MotorFrame::from_array(values))
}

fn read_f64(data: &[u8], offset: usize, order: ByteOrder) -> Option<f64> {
    let end = offset.checked_add(FIELD_WIDTH)?;
    let bytes: [u8; FIELD_WIDTH] = data.get(offset..end)?.try_into().ok()?;
    Some(match order {
        ByteOrder::Little => f64::from_le_bytes(bytes),
        ByteOrder::Big => f64::from_be_bytes(bytes),
    })
}

fn write_frame(frame: &MotorFrame, order: ByteOrder, out: &mut Vec<u8>) {
    for value in frame.to_array() {
        let bytes = match order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        out.extend_from_slice(&bytes);
    }
}

pub(crate) fn encode_frames(frames: &[MotorFrame], order: ByteOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames.len().saturating_mul(MOTOR_RECORD_SIZE));
    for frame in frames {
        write_frame(frame, order, &mut out);
    }
    out
}

/// Decoder bound to one pipeline's fixed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    unit_count: usize,
    unit_stride: usize,
    byte_order: ByteOrder,
}

impl FrameCodec {
    /// Codec for `unit_count` tightly packed little-endian records.
    pub fn new(unit_count: usize) -> Self {
        Self {
            unit_count,
            unit_stride: MOTOR_RECORD_SIZE,
            byte_order: ByteOrder::Little,
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Space records `unit_stride` bytes apart instead of packing them.
    ///
    /// # Errors
    ///
    /// Fails when the stride cannot hold a record or the layout overflows.
    pub fn with_unit_stride(mut self, unit_stride: usize) -> Result<Self, DecodeError> {
        expected_len(self.unit_count, unit_stride)?;
        self.unit_stride = unit_stride;
        Ok(self)
    }

    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    pub fn unit_stride(&self) -> usize {
        self.unit_stride
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Exact datagram length this codec accepts.
    pub fn expected_len(&self) -> usize {
        self.unit_count.saturating_mul(self.unit_stride)
    }

    /// Decode one datagram.
    ///
    /// # Errors
    ///
    /// See [`decode`].
    pub fn decode(&self, raw: &[u8]) -> Result<FrameBatch, DecodeError> {
        decode(raw, self.unit_count, self.unit_stride, self.byte_order)
    }

    /// Encode a batch using this codec's layout, zero-filling stride padding.
    pub fn encode(&self, batch: &FrameBatch) -> Vec<u8> {
        let mut out = Vec::with_capacity(batch.len().saturating_mul(self.unit_stride));
        for frame in batch {
            let start = out.len();
            write_frame(frame, self.byte_order, &mut out);
            out.resize(start.saturating_add(self.unit_stride), 0);
        }
        out
    }
}
