//! Appointment models.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fields::{
    optional_i64, optional_string, required, required_i64, FieldError, FieldValue, Fields,
};

/// Canonical date form stored and compared by the scheduler.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical time form (minute granularity).
pub const TIME_FORMAT: &str = "%H:%M";

/// Appointment lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum AppointmentStatus {
    /// Booked and still pending
    #[default]
    Scheduled,
    /// Took place
    Completed,
    /// Archived; never blocks a slot
    Cancelled,
}

/// Returned by `AppointmentStatus::from_str` for labels outside the known set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown appointment status: {0}")]
pub struct UnknownStatus(pub String);

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 3] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    /// Label used in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }

    /// Parse a label, falling back to `Scheduled` for anything unrecognized.
    pub fn coerce(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled)
    }
}

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled encounter between one patient and one doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Appointment {
    /// Store-assigned ID - `None` until persisted
    id: Option<i64>,
    /// Patient ID
    pub patient_id: i64,
    /// Doctor ID
    pub doctor_id: i64,
    /// Date as `YYYY-MM-DD`
    pub date: String,
    /// Time as `HH:MM`
    pub time: String,
    /// Lifecycle status
    pub status: AppointmentStatus,
    /// Patient display name (joined reads only, never persisted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    /// Doctor display name (joined reads only, never persisted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
}

impl Appointment {
    /// Create a new, unpersisted appointment with status `Scheduled`.
    pub fn new(
        patient_id: i64,
        doctor_id: i64,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            patient_id,
            doctor_id,
            date: date.into(),
            time: time.into(),
            status: AppointmentStatus::Scheduled,
            patient_name: None,
            doctor_name: None,
        }
    }

    /// Create a new appointment from parsed values, in canonical string form.
    pub fn at(patient_id: i64, doctor_id: i64, date: NaiveDate, time: NaiveTime) -> Self {
        Self::new(
            patient_id,
            doctor_id,
            date.format(DATE_FORMAT).to_string(),
            time.format(TIME_FORMAT).to_string(),
        )
    }

    pub fn with_status(mut self, status: AppointmentStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the status from a free-form label (unknown labels become `Scheduled`).
    pub fn with_status_label(self, label: &str) -> Self {
        self.with_status(AppointmentStatus::coerce(label))
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Only the repository and row decoding assign identifiers.
    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.is_cancelled()
    }

    /// Combined date and time, or `None` when either part does not parse.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(
            &format!("{} {}", self.date, self.time),
            &format!("{} {}", DATE_FORMAT, TIME_FORMAT),
        )
        .ok()
    }

    /// Copy with date and time rewritten to `YYYY-MM-DD` / `HH:MM`, or
    /// `None` when either does not parse.
    pub fn canonical(&self) -> Option<Self> {
        let date = parse_date_text(&self.date)?;
        let time = parse_time_text(&self.time)?;
        Some(Self {
            date: date.format(DATE_FORMAT).to_string(),
            time: time.format(TIME_FORMAT).to_string(),
            ..self.clone()
        })
    }

    /// Whether both appointments claim the same slot for the same doctor or
    /// the same patient. Cancelled appointments never conflict.
    pub fn conflicts_with(&self, other: &Appointment) -> bool {
        self.date == other.date
            && self.time == other.time
            && (self.doctor_id == other.doctor_id || self.patient_id == other.patient_id)
            && !self.is_cancelled()
            && !other.is_cancelled()
            && self.id != other.id
    }

    /// Build from a store row or any other field-mapping.
    ///
    /// `date` and `time` may arrive as native values or text; both are
    /// normalized to `YYYY-MM-DD` / `HH:MM` and seconds are dropped. A missing
    /// or unknown `status` reads as `Scheduled`.
    pub fn from_fields(fields: &Fields) -> Result<Self, FieldError> {
        let status = optional_string(fields, "status")
            .map(|label| AppointmentStatus::coerce(&label))
            .unwrap_or_default();

        Ok(Self {
            id: optional_i64(fields, "id")?,
            patient_id: required_i64(fields, "patient_id")?,
            doctor_id: required_i64(fields, "doctor_id")?,
            date: canonical_date(required(fields, "date")?, "date")?,
            time: canonical_time(required(fields, "time")?, "time")?,
            status,
            patient_name: optional_string(fields, "patient_name"),
            doctor_name: optional_string(fields, "doctor_name"),
        })
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("id".into(), self.id.into());
        fields.insert("patient_id".into(), self.patient_id.into());
        fields.insert("doctor_id".into(), self.doctor_id.into());
        fields.insert("date".into(), self.date.clone().into());
        fields.insert("time".into(), self.time.clone().into());
        fields.insert("status".into(), self.status.as_str().into());
        fields.insert("patient_name".into(), self.patient_name.clone().into());
        fields.insert("doctor_name".into(), self.doctor_name.clone().into());
        fields
    }
}

impl fmt::Display for Appointment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "New".to_string());
        let patient = self
            .patient_name
            .clone()
            .unwrap_or_else(|| format!("Patient {}", self.patient_id));
        let doctor = self
            .doctor_name
            .clone()
            .unwrap_or_else(|| format!("Doctor {}", self.doctor_id));
        write!(
            f,
            "Appointment {}: {} - {} - {} {}",
            id, patient, doctor, self.date, self.time
        )
    }
}

fn canonical_date(value: &FieldValue, field: &str) -> Result<String, FieldError> {
    match value {
        FieldValue::Date(date) => Ok(date.format(DATE_FORMAT).to_string()),
        FieldValue::DateTime(dt) => Ok(dt.date().format(DATE_FORMAT).to_string()),
        FieldValue::Text(text) => Ok(canonical_date_text(text)),
        FieldValue::Integer(i) => Ok(i.to_string()),
        FieldValue::Real(r) => Ok(r.to_string()),
        FieldValue::Null => Err(FieldError::Missing(field.to_string())),
        FieldValue::Time(_) | FieldValue::Blob(_) => Err(FieldError::WrongType {
            field: field.to_string(),
            expected: "date",
        }),
    }
}

fn canonical_time(value: &FieldValue, field: &str) -> Result<String, FieldError> {
    match value {
        FieldValue::Time(time) => Ok(time.format(TIME_FORMAT).to_string()),
        FieldValue::DateTime(dt) => Ok(dt.time().format(TIME_FORMAT).to_string()),
        FieldValue::Text(text) => Ok(canonical_time_text(text)),
        FieldValue::Integer(i) => Ok(i.to_string()),
        FieldValue::Real(r) => Ok(r.to_string()),
        FieldValue::Null => Err(FieldError::Missing(field.to_string())),
        FieldValue::Date(_) | FieldValue::Blob(_) => Err(FieldError::WrongType {
            field: field.to_string(),
            expected: "time",
        }),
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok().or_else(|| {
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .map(|dt| dt.date())
    })
}

fn parse_time_text(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    [TIME_FORMAT, "%H:%M:%S", "%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
}

/// Unparseable text is kept as-is so `datetime()` can report it.
fn canonical_date_text(text: &str) -> String {
    parse_date_text(text)
        .map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

fn canonical_time_text(text: &str) -> String {
    parse_time_text(text)
        .map(|time| time.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| text.trim().to_string())
}
