//! Field-mapping representation of store rows.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single column value as exchanged with the record store.
///
/// Besides the SQLite storage classes this also carries native `chrono`
/// values, so callers can hand dates and times to the entities without
/// formatting them first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

/// One row, keyed by column name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Errors raised while reading an entity out of a field-mapping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Missing field: {0}")]
    Missing(String),

    #[error("Field '{field}' has an unexpected type, expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Integer view of the value. Numeric text is accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            FieldValue::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<NaiveTime> for FieldValue {
    fn from(value: NaiveTime) -> Self {
        FieldValue::Time(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::DateTime(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Look up a non-null field.
pub(crate) fn required<'a>(fields: &'a Fields, key: &str) -> Result<&'a FieldValue, FieldError> {
    match fields.get(key) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(FieldError::Missing(key.to_string())),
    }
}

pub(crate) fn required_i64(fields: &Fields, key: &str) -> Result<i64, FieldError> {
    required(fields, key)?
        .as_i64()
        .ok_or_else(|| FieldError::WrongType {
            field: key.to_string(),
            expected: "integer",
        })
}

/// Absent and null both read as `None`.
pub(crate) fn optional_i64(fields: &Fields, key: &str) -> Result<Option<i64>, FieldError> {
    match fields.get(key) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| FieldError::WrongType {
            field: key.to_string(),
            expected: "integer",
        }),
    }
}

pub(crate) fn required_string(fields: &Fields, key: &str) -> Result<String, FieldError> {
    required(fields, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| FieldError::WrongType {
            field: key.to_string(),
            expected: "text",
        })
}

pub(crate) fn optional_string(fields: &Fields, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(FieldValue::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_i64_accepts_numeric_text() {
        assert_eq!(FieldValue::Text(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(FieldValue::Real(7.0).as_i64(), Some(7));
        assert_eq!(FieldValue::Real(7.5).as_i64(), None);
        assert_eq!(FieldValue::Text("abc".into()).as_i64(), None);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::Text("x".into()));
    }

    #[test]
    fn test_required_rejects_null() {
        let mut fields = Fields::new();
        fields.insert("id".into(), FieldValue::Null);

        assert_eq!(
            required_i64(&fields, "id"),
            Err(FieldError::Missing("id".into()))
        );
        assert_eq!(optional_i64(&fields, "id"), Ok(None));
    }

    #[test]
    fn test_wrong_type() {
        let mut fields = Fields::new();
        fields.insert("name".into(), FieldValue::Integer(3));

        assert!(matches!(
            required_string(&fields, "name"),
            Err(FieldError::WrongType { expected: "text", .. })
        ));
    }
}
