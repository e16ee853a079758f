//! Doctor database operations.

use super::{count_of, DbResult, Store};
use crate::models::{Doctor, FieldValue};

/// CRUD access to the `doctors` table.
pub struct DoctorRepository<S: Store> {
    store: S,
}

impl<S: Store> DoctorRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// List all doctors, ordered by name.
    pub fn get_all(&mut self) -> DbResult<Vec<Doctor>> {
        let rows = self.store.query(
            "SELECT id, full_name, specialty, phone FROM doctors ORDER BY full_name",
            &[],
        )?;
        rows.iter()
            .map(Doctor::from_fields)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Get a doctor by ID.
    pub fn get_by_id(&mut self, id: i64) -> DbResult<Option<Doctor>> {
        let rows = self.store.query(
            "SELECT id, full_name, specialty, phone FROM doctors WHERE id = ?1",
            &[id.into()],
        )?;
        rows.first()
            .map(Doctor::from_fields)
            .transpose()
            .map_err(Into::into)
    }

    /// Insert a new doctor and assign the generated ID onto it.
    pub fn add(&mut self, doctor: &mut Doctor) -> DbResult<i64> {
        let execution = self.store.execute(
            "INSERT INTO doctors (full_name, specialty, phone) VALUES (?1, ?2, ?3)",
            &[
                doctor.full_name.as_str().into(),
                doctor.specialty.as_str().into(),
                doctor.phone.as_str().into(),
            ],
        )?;
        doctor.set_id(execution.last_insert_id);
        Ok(execution.last_insert_id)
    }

    /// Update an existing doctor.
    pub fn update(&mut self, id: i64, doctor: &Doctor) -> DbResult<bool> {
        let execution = self.store.execute(
            "UPDATE doctors SET full_name = ?1, specialty = ?2, phone = ?3 WHERE id = ?4",
            &[
                doctor.full_name.as_str().into(),
                doctor.specialty.as_str().into(),
                doctor.phone.as_str().into(),
                id.into(),
            ],
        )?;
        Ok(execution.rows_affected > 0)
    }

    /// Delete a doctor. Refused while any appointment references them.
    pub fn delete(&mut self, id: i64) -> DbResult<bool> {
        let rows = self.store.query(
            "SELECT COUNT(*) AS count FROM appointments WHERE doctor_id = ?1",
            &[FieldValue::from(id)],
        )?;
        if count_of(&rows) > 0 {
            tracing::warn!(doctor_id = id, "doctor has appointments, not deleting");
            return Ok(false);
        }

        let execution = self
            .store
            .execute("DELETE FROM doctors WHERE id = ?1", &[id.into()])?;
        Ok(execution.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;

    #[test]
    fn test_insert_and_get() {
        let mut repo = DoctorRepository::new(SqliteStore::open_in_memory().unwrap());

        let mut doctor = Doctor::new("Luis Vega");
        doctor.specialty = "Cardiology".into();
        let id = repo.add(&mut doctor).unwrap();

        let retrieved = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(retrieved.id(), Some(id));
        assert_eq!(retrieved.specialty, "Cardiology");
        assert_eq!(repo.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_without_appointments() {
        let mut repo = DoctorRepository::new(SqliteStore::open_in_memory().unwrap());
        let id = repo.add(&mut Doctor::new("Luis Vega")).unwrap();

        assert!(repo.delete(id).unwrap());
        assert!(!repo.delete(id).unwrap());
    }
}
