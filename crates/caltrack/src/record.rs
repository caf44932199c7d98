//! Core record types for caltrack.
//!
//! This module defines the data structures for a tracked transducer and the
//! editable subset of its fields.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a transducer is in service or withdrawn for calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CalibrationStatus {
    /// In normal service; expiry is tracked.
    #[default]
    #[serde(rename = "OK")]
    Ok,
    /// Sent out for calibration; expiry is suppressed.
    InCalibration,
}

impl CalibrationStatus {
    /// Parse the persisted text form.
    ///
    /// Accepts the spellings written by older versions of the data file.
    /// Returns `None` for anything unrecognised.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("ok") {
            return Some(Self::Ok);
        }
        let lowered = s.to_lowercase();
        match lowered.as_str() {
            "incalibration" | "in calibration" | "in_calibration" | "em calibração" => {
                Some(Self::InCalibration)
            }
            _ => None,
        }
    }

    /// The text written to the data file.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InCalibration => "InCalibration",
        }
    }
}

impl std::fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked transducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transducer {
    /// Identifier assigned by the store; never changes.
    pub id: u64,

    /// Free-text description.
    pub description: String,

    /// Expiry as stored: `YYYY-MM-DD`, legacy `YYYY-MM`, or whatever text
    /// the file holds. Interpretation happens in [`crate::validity`].
    pub expiry_date: String,

    /// Serial number, empty when unknown.
    pub serial_number: String,

    /// Physical location, empty when unknown.
    pub location: String,

    /// Calibration state.
    pub calibration_status: CalibrationStatus,

    /// Pressure rating, empty when unknown.
    pub psi: String,
}

impl Transducer {
    /// Build a fresh record from editable fields.
    #[must_use]
    pub fn new(id: u64, fields: TransducerFields) -> Self {
        Self {
            id,
            description: fields.description,
            expiry_date: fields.expiry_date,
            serial_number: fields.serial_number,
            location: fields.location,
            calibration_status: CalibrationStatus::Ok,
            psi: fields.psi,
        }
    }

    /// Whether the transducer is currently withdrawn for calibration.
    #[must_use]
    pub fn is_calibrating(&self) -> bool {
        self.calibration_status == CalibrationStatus::InCalibration
    }

    /// The editable fields of this record.
    #[must_use]
    pub fn fields(&self) -> TransducerFields {
        TransducerFields {
            description: self.description.clone(),
            expiry_date: self.expiry_date.clone(),
            serial_number: self.serial_number.clone(),
            location: self.location.clone(),
            psi: self.psi.clone(),
        }
    }

    /// Overwrite the editable fields.
    ///
    /// The calibration status is reset to [`CalibrationStatus::Ok`] only when
    /// the expiry date changes; otherwise it is kept.
    pub fn apply(&mut self, fields: TransducerFields) {
        if fields.expiry_date != self.expiry_date {
            self.calibration_status = CalibrationStatus::Ok;
        }
        self.description = fields.description;
        self.expiry_date = fields.expiry_date;
        self.serial_number = fields.serial_number;
        self.location = fields.location;
        self.psi = fields.psi;
    }
}

/// The user-editable fields of a transducer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransducerFields {
    /// Free-text description (required).
    pub description: String,
    /// Expiry date text (required).
    pub expiry_date: String,
    /// Serial number.
    pub serial_number: String,
    /// Location.
    pub location: String,
    /// Pressure rating.
    pub psi: String,
}

impl TransducerFields {
    /// Create fields with the two required values set.
    #[must_use]
    pub fn new(description: impl Into<String>, expiry_date: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            expiry_date: expiry_date.into(),
            ..Self::default()
        }
    }

    /// Reject blank required fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first blank required field.
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::Validation {
                field: "description",
            });
        }
        if self.expiry_date.trim().is_empty() {
            return Err(Error::Validation {
                field: "expiry_date",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transducer {
        let mut fields = TransducerFields::new("Pressure transducer", "2030-01-31");
        fields.serial_number = "SN-1".to_string();
        Transducer::new(7, fields)
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(CalibrationStatus::parse("OK"), Some(CalibrationStatus::Ok));
        assert_eq!(CalibrationStatus::parse(""), Some(CalibrationStatus::Ok));
        assert_eq!(
            CalibrationStatus::parse("InCalibration"),
            Some(CalibrationStatus::InCalibration)
        );
        assert_eq!(
            CalibrationStatus::parse("In Calibration"),
            Some(CalibrationStatus::InCalibration)
        );
        assert_eq!(
            CalibrationStatus::parse("Em Calibração"),
            Some(CalibrationStatus::InCalibration)
        );
        assert_eq!(CalibrationStatus::parse("broken"), None);
    }

    #[test]
    fn test_status_display_round_trips() {
        for status in [CalibrationStatus::Ok, CalibrationStatus::InCalibration] {
            assert_eq!(CalibrationStatus::parse(&status.to_string()), Some(status));
        }
    }

    #[test]
    fn test_new_record_is_ok() {
        let record = sample();
        assert_eq!(record.id, 7);
        assert_eq!(record.calibration_status, CalibrationStatus::Ok);
        assert!(!record.is_calibrating());
        assert_eq!(record.location, "");
    }

    #[test]
    fn test_apply_changed_expiry_resets_status() {
        let mut record = sample();
        record.calibration_status = CalibrationStatus::InCalibration;

        let mut fields = record.fields();
        fields.expiry_date = "2031-01-31".to_string();
        record.apply(fields);

        assert_eq!(record.calibration_status, CalibrationStatus::Ok);
        assert_eq!(record.expiry_date, "2031-01-31");
    }

    #[test]
    fn test_apply_same_expiry_keeps_status() {
        let mut record = sample();
        record.calibration_status = CalibrationStatus::InCalibration;

        let mut fields = record.fields();
        fields.location = "Bay 4".to_string();
        record.apply(fields);

        assert_eq!(record.calibration_status, CalibrationStatus::InCalibration);
        assert_eq!(record.location, "Bay 4");
    }

    #[test]
    fn test_validate_required_fields() {
        assert!(TransducerFields::new("x", "2030-01-01").validate().is_ok());

        let err = TransducerFields::new("  ", "2030-01-01")
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: "description"
            }
        ));

        let err = TransducerFields::new("x", "").validate().unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: "expiry_date"
            }
        ));
    }

    #[test]
    fn test_status_serializes_as_persisted_text() {
        let json = serde_json::to_string(&CalibrationStatus::Ok).unwrap();
        assert_eq!(json, "\"OK\"");
        let json = serde_json::to_string(&CalibrationStatus::InCalibration).unwrap();
        assert_eq!(json, "\"InCalibration\"");
    }
}
