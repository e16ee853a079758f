//! Domain models for appointment scheduling.

mod appointment;
mod doctor;
mod fields;
mod patient;

pub use appointment::*;
pub use doctor::*;
pub use fields::{FieldError, FieldValue, Fields};
pub use patient::*;
