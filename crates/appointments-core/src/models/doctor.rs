//! Doctor models.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::fields::{optional_i64, optional_string, required_string, FieldError, Fields};

/// A doctor whose time slots are booked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Doctor {
    /// Store-assigned ID - `None` until persisted
    id: Option<i64>,
    /// Full name
    pub full_name: String,
    /// Specialty (may be empty)
    pub specialty: String,
    /// Contact phone
    pub phone: String,
}

impl Doctor {
    /// Create a new doctor with required fields.
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            id: None,
            full_name: full_name.into(),
            specialty: String::new(),
            phone: String::new(),
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
            specialty: optional_string(fields, "specialty").unwrap_or_default(),
            phone: optional_string(fields, "phone").unwrap_or_default(),
        })
    }
}

impl fmt::Display for Doctor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.specialty.is_empty() {
            write!(f, "Dr. {}", self.full_name)
        } else {
            write!(f, "Dr. {} - {}", self.full_name, self.specialty)
        }
    }
}
