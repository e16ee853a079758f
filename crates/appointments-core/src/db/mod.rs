//! Record store layer for appointment scheduling.

mod doctors;
mod patients;
mod schema;
mod store;

pub use doctors::*;
pub use patients::*;
pub use schema::*;
pub use store::*;

use thiserror::Error;

use crate::models::{FieldError, FieldValue, Fields};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Row decode error: {0}")]
    Decode(#[from] FieldError),

    #[error("Schema integrity error: {0}")]
    Schema(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Read the `count` column of a `SELECT COUNT(*) AS count` result.
pub(crate) fn count_of(rows: &[Fields]) -> i64 {
    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(FieldValue::as_i64)
        .unwrap_or(0)
}

/// Check that every table and column in [`REQUIRED_COLUMNS`] is present.
pub fn verify_schema<S: Store + ?Sized>(store: &mut S) -> DbResult<()> {
    for (table, columns) in REQUIRED_COLUMNS {
        let rows = store.query(
            "SELECT name FROM pragma_table_info(?1)",
            &[FieldValue::from(*table)],
        )?;
        if rows.is_empty() {
            return Err(DbError::Schema(format!("table '{}' does not exist", table)));
        }

        let present: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get("name").and_then(FieldValue::as_str))
            .collect();
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|column| !present.contains(column))
            .collect();
        if !missing.is_empty() {
            return Err(DbError::Schema(format!(
                "table '{}' is missing columns: {}",
                table,
                missing.join(", ")
            )));
        }
    }
    Ok(())
}
