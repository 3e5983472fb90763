//! Field projection for plotting.
//!
//! A [`FieldSelection`] decides which fields of each record reach the time
//! series sink, and in which order. Series names are derived from the same
//! selection so values and names always line up positionally.

use serde::{Deserialize, Serialize};

use crate::field::{FIELD_COUNT, MotorField, UnknownField};
use crate::frame::MotorFrame;

/// Ordered subset of [`MotorField`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSelection {
    fields: Vec<MotorField>,
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self::plot_default()
    }
}

impl FieldSelection {
    pub fn new(fields: Vec<MotorField>) -> Self {
        Self { fields }
    }

    /// Position, velocity, torque, error, temperature and MOS temperature.
    pub fn plot_default() -> Self {
        Self::new(vec![
            MotorField::Position,
            MotorField::Velocity,
            MotorField::Torque,
            MotorField::ErrorCode,
            MotorField::Temperature,
            MotorField::MosTemperature,
        ])
    }

    /// Every field in wire order.
    pub fn all() -> Self {
        Self::new(MotorField::ALL.to_vec())
    }

    /// Parse a selection from field names or series labels.
    ///
    /// # Errors
    ///
    /// Returns the first name that matches no field.
    pub fn from_names<I, S>(names: I) -> Result<Self, UnknownField>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().parse::<MotorField>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Keep at most `max` leading fields.
    pub fn truncated(&self, max: usize) -> Self {
        Self::new(self.fields.iter().copied().take(max).collect())
    }

    pub fn fields(&self) -> &[MotorField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of values a projection actually yields.
    pub fn projected_len(&self) -> usize {
        self.fields.len().min(FIELD_COUNT)
    }

    /// Extract the selected values from one record.
    pub fn project(&self, frame: &MotorFrame) -> Vec<f64> {
        project(frame, self)
    }

    /// Fields that take part in a projection, after truncation.
    pub fn projected_fields(&self) -> impl Iterator<Item = MotorField> + '_ {
        self.fields.iter().copied().take(FIELD_COUNT)
    }

    /// Series names for every unit, unit-major, matching [`Self::project`].
    pub fn series_names(&self, unit_count: usize) -> Vec<String> {
        (0..unit_count)
            .flat_map(|unit_id| {
                self.projected_fields()
                    .map(move |field| series_name(unit_id, field))
            })
            .collect()
    }
}

/// Extract `selection` from `frame`, in selection order.
///
/// A selection longer than the record is truncated to [`FIELD_COUNT`]
/// values rather than rejected.
pub fn project(frame: &MotorFrame, selection: &FieldSelection) -> Vec<f64> {
    selection
        .projected_fields()
        .map(|field| frame.get(field))
        .collect()
}

/// Series name for one field of one motor. Motors are numbered from 1.
pub fn series_name(unit_id: usize, field: MotorField) -> String {
    format!("Motor{}/{}", unit_id.saturating_add(1), field.series_label())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_frame() -> MotorFrame {
        MotorFrame::from_array(core::array::from_fn(|i| i as f64))
    }

    #[test]
    fn projects_in_selection_order() {
        let selection = FieldSelection::new(vec![
            MotorField::Temperature,
            MotorField::Mode,
            MotorField::Position,
        ]);
        let values = selection.project(&numbered_frame());
        assert_eq!(values.len(), 3);
        assert_eq!(
            values.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            vec![11.0f64.to_bits(), 0.0f64.to_bits(), 3.0f64.to_bits()]
        );
    }

    #[test]
    fn oversized_selection_is_truncated() -> Result<(), UnknownField> {
        let names: Vec<&str> = MotorField::ALL
            .iter()
            .map(|field| field.name())
            .chain(["pos", "vel", "torque", "kp", "kd", "ff", "error"])
            .collect();
        assert_eq!(names.len(), 20);

        let selection = FieldSelection::from_names(&names)?;
        assert_eq!(selection.len(), 20);
        assert_eq!(selection.project(&numbered_frame()).len(), FIELD_COUNT);
        assert_eq!(selection.projected_len(), FIELD_COUNT);
        Ok(())
    }

    #[test]
    fn series_names_line_up_with_projection() {
        let selection = FieldSelection::plot_default();
        let names = selection.series_names(2);
        assert_eq!(names.len(), 12);
        assert_eq!(names.first().map(String::as_str), Some("Motor1/Pos"));
        assert_eq!(names.get(3).map(String::as_str), Some("Motor1/Error"));
        assert_eq!(names.get(6).map(String::as_str), Some("Motor2/Pos"));
        assert_eq!(names.last().map(String::as_str), Some("Motor2/Mos Temperature"));
    }

    #[test]
    fn truncated_keeps_leading_fields() {
        let selection = FieldSelection::all().truncated(2);
        assert_eq!(selection.fields(), &[MotorField::Mode, MotorField::Index]);
    }

    #[test]
    fn from_names_reports_unknown_field() {
        let err = FieldSelection::from_names(["pos", "rpm"]);
        assert_eq!(err, Err(UnknownField("rpm".to_string())));
    }
}
