//! Patient database operations.

use super::{count_of, DbResult, Store};
use crate::models::{FieldValue, Patient};

/// CRUD access to the `patients` table.
pub struct PatientRepository<S: Store> {
    store: S,
}

impl<S: Store> PatientRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// List all patients, ordered by name.
    pub fn get_all(&mut self) -> DbResult<Vec<Patient>> {
        let rows = self.store.query(
            "SELECT id, full_name, phone, email FROM patients ORDER BY full_name",
            &[],
        )?;
        rows.iter()
            .map(Patient::from_fields)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Get a patient by ID.
    pub fn get_by_id(&mut self, id: i64) -> DbResult<Option<Patient>> {
        let rows = self.store.query(
            "SELECT id, full_name, phone, email FROM patients WHERE id = ?1",
            &[id.into()],
        )?;
        rows.first()
            .map(Patient::from_fields)
            .transpose()
            .map_err(Into::into)
    }

    /// Insert a new patient and assign the generated ID onto it.
    pub fn add(&mut self, patient: &mut Patient) -> DbResult<i64> {
        let execution = self.store.execute(
            "INSERT INTO patients (full_name, phone, email) VALUES (?1, ?2, ?3)",
            &[
                patient.full_name.as_str().into(),
                patient.phone.as_str().into(),
                patient.email.as_str().into(),
            ],
        )?;
        patient.set_id(execution.last_insert_id);
        Ok(execution.last_insert_id)
    }

    /// Patient whose name matches `full_name` ignoring case, inserting a new
    /// one when none does. The lowest ID wins when several match.
    pub fn find_or_create_by_name(&mut self, full_name: &str) -> DbResult<Patient> {
        let full_name = full_name.trim();
        let rows = self.store.query(
            "SELECT id, full_name, phone, email FROM patients
             WHERE lower(full_name) = lower(?1)
             ORDER BY id LIMIT 1",
            &[full_name.into()],
        )?;
        if let Some(row) = rows.first() {
            return Ok(Patient::from_fields(row)?);
        }

        let mut patient = Patient::new(full_name);
        let id = self.add(&mut patient)?;
        tracing::info!(patient_id = id, "created patient on name lookup");
        Ok(patient)
    }

    /// Update an existing patient.
    pub fn update(&mut self, id: i64, patient: &Patient) -> DbResult<bool> {
        let execution = self.store.execute(
            "UPDATE patients SET full_name = ?1, phone = ?2, email = ?3 WHERE id = ?4",
            &[
                patient.full_name.as_str().into(),
                patient.phone.as_str().into(),
                patient.email.as_str().into(),
                id.into(),
            ],
        )?;
        Ok(execution.rows_affected > 0)
    }

    /// Delete a patient. Refused while any appointment references them.
    pub fn delete(&mut self, id: i64) -> DbResult<bool> {
        let rows = self.store.query(
            "SELECT COUNT(*) AS count FROM appointments WHERE patient_id = ?1",
            &[FieldValue::from(id)],
        )?;
        if count_of(&rows) > 0 {
            tracing::warn!(patient_id = id, "patient has appointments, not deleting");
            return Ok(false);
        }

        let execution = self
            .store
            .execute("DELETE FROM patients WHERE id = ?1", &[id.into()])?;
        Ok(execution.rows_affected > 0)
    }
}
