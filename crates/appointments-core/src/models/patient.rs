//! Patient models.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::fields::{optional_i64, optional_string, required_string, FieldError, Fields};

/// A patient that appointments can be booked for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patient {
    /// Store-assigned ID - `None` until persisted
    id: Option<i64>,
    /// Full name
    pub full_name: String,
    /// Contact phone
    pub phone: String,
    /// Contact email
    pub email: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            id: None,
            full_name: full_name.into(),
            phone: String::new(),
            email: String::new(),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn from_fields(fields: &Fields) -> Result<Self, FieldError> {
        Ok(Self {
            id: optional_i64(fields, "id")?,
            full_name: required_string(fields, "full_name")?,
            phone: optional_string(fields, "phone").unwrap_or_default(),
            email: optional_string(fields, "email").unwrap_or_default(),
        })
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} (ID: {})", self.full_name, id),
            None => f.write_str(&self.full_name),
        }
    }
}
