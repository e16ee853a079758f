//! Appointment persistence with double-booking prevention.
//!
//! The repository is the only writer of the `appointments` table. Every write
//! reports a [`ScheduleOutcome`]; store failures are logged and folded into
//! [`ScheduleOutcome::Failed`] instead of being returned as errors.
//!
//! The conflict check and the write are separate statements with no slot
//! lock or unique constraint behind them, so two writers racing for the same
//! slot can both succeed. The scheduler assumes a single writer.

use std::sync::Arc;

use crate::db::{count_of, verify_schema, DbError, DbResult, Store};
use crate::models::{Appointment, AppointmentStatus, FieldValue};
use crate::notify::{AppointmentEvent, Observer, Subject};

/// Result of a scheduling write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// Write applied to the appointment with this ID
    Success(i64),
    /// The doctor already has a live appointment in that slot
    DoctorBusy,
    /// The patient already has a live appointment in that slot
    PatientBusy,
    /// No appointment with the requested ID
    NotFound,
    /// Cancel requested on an appointment that is already cancelled
    AlreadyCancelled,
    /// Complete requested on an appointment that is already completed
    AlreadyCompleted,
    /// The store rejected or could not run the write
    Failed(String),
}

impl ScheduleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScheduleOutcome::Success(_))
    }
}

const SELECT_JOINED: &str = r#"
    SELECT a.id, a.patient_id, a.doctor_id, a.date, a.time, a.status,
           p.full_name AS patient_name, d.full_name AS doctor_name
    FROM appointments a
    INNER JOIN patients p ON a.patient_id = p.id
    INNER JOIN doctors d ON a.doctor_id = d.id
"#;

// ?5 is the appointment being rescheduled, or NULL for a new one.
const DOCTOR_CONFLICT: &str = r#"
    SELECT COUNT(*) AS count FROM appointments
    WHERE date = ?1 AND time = ?2 AND doctor_id = ?3 AND status != ?4
      AND (?5 IS NULL OR id != ?5)
"#;

const PATIENT_CONFLICT: &str = r#"
    SELECT COUNT(*) AS count FROM appointments
    WHERE date = ?1 AND time = ?2 AND patient_id = ?3 AND status != ?4
      AND (?5 IS NULL OR id != ?5)
"#;

const INSERT: &str = r#"
    INSERT INTO appointments (patient_id, doctor_id, date, time, status)
    VALUES (?1, ?2, ?3, ?4, ?5)
"#;

const UPDATE: &str = r#"
    UPDATE appointments
    SET patient_id = ?1, doctor_id = ?2, date = ?3, time = ?4, status = ?5
    WHERE id = ?6
"#;

/// Appointment repository.
pub struct AppointmentRepository<S: Store> {
    store: S,
    subject: Subject,
}

impl<S: Store> AppointmentRepository<S> {
    /// Wrap a store, failing if the schema is missing required tables or columns.
    pub fn new(mut store: S) -> DbResult<Self> {
        if let Err(e) = verify_schema(&mut store) {
            tracing::error!(error = %e, "appointment store failed schema verification");
            return Err(e);
        }
        Ok(Self {
            store,
            subject: Subject::new(),
        })
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.subject.attach(observer);
    }

    pub fn unsubscribe(&self, observer: &Arc<dyn Observer>) {
        self.subject.detach(observer);
    }

    /// All appointments with patient and doctor names, ordered by date and time.
    pub fn get_all(&mut self) -> DbResult<Vec<Appointment>> {
        self.select(&format!("{} ORDER BY a.date, a.time, a.id", SELECT_JOINED), &[])
    }

    pub fn get_by_id(&mut self, id: i64) -> DbResult<Option<Appointment>> {
        let mut appointments =
            self.select(&format!("{} WHERE a.id = ?1", SELECT_JOINED), &[id.into()])?;
        Ok(appointments.pop())
    }

    pub fn get_by_doctor(&mut self, doctor_id: i64) -> DbResult<Vec<Appointment>> {
        self.select(
            &format!("{} WHERE a.doctor_id = ?1 ORDER BY a.date, a.time, a.id", SELECT_JOINED),
            &[doctor_id.into()],
        )
    }

    pub fn get_by_patient(&mut self, patient_id: i64) -> DbResult<Vec<Appointment>> {
        self.select(
            &format!("{} WHERE a.patient_id = ?1 ORDER BY a.date, a.time, a.id", SELECT_JOINED),
            &[patient_id.into()],
        )
    }

    /// Book a new appointment and assign the generated ID onto it.
    pub fn add(&mut self, appointment: &mut Appointment) -> ScheduleOutcome {
        self.try_add(appointment)
            .unwrap_or_else(|e| failed(e, "add appointment"))
    }

    /// Overwrite the appointment stored under `id`.
    pub fn update(&mut self, id: i64, appointment: &Appointment) -> ScheduleOutcome {
        self.try_update(id, appointment)
            .unwrap_or_else(|e| failed(e, "update appointment"))
    }

    /// Remove the appointment row.
    pub fn delete(&mut self, id: i64) -> ScheduleOutcome {
        self.try_delete(id)
            .unwrap_or_else(|e| failed(e, "delete appointment"))
    }

    /// Mark the appointment as cancelled, freeing its slot.
    pub fn cancel(&mut self, id: i64) -> ScheduleOutcome {
        self.try_cancel(id)
            .unwrap_or_else(|e| failed(e, "cancel appointment"))
    }

    /// Mark the appointment as completed. Goes through [`Self::update`], so
    /// the usual conflict rules apply.
    pub fn complete(&mut self, id: i64) -> ScheduleOutcome {
        match self.get_by_id(id) {
            Ok(Some(appointment)) if appointment.status == AppointmentStatus::Completed => {
                ScheduleOutcome::AlreadyCompleted
            }
            Ok(Some(appointment)) => {
                let completed = appointment.with_status(AppointmentStatus::Completed);
                self.update(id, &completed)
            }
            Ok(None) => ScheduleOutcome::NotFound,
            Err(e) => failed(e, "complete appointment"),
        }
    }

    /// Release the store connection.
    pub fn close(mut self) -> DbResult<()> {
        self.store.close()
    }

    fn try_add(&mut self, appointment: &mut Appointment) -> DbResult<ScheduleOutcome> {
        match appointment.canonical() {
            Some(canonical) => *appointment = canonical,
            None => return Ok(invalid_slot(appointment)),
        }
        if let Some(conflict) = self.find_conflict(appointment, None)? {
            return Ok(conflict);
        }

        let execution = self.store.execute(
            INSERT,
            &[
                appointment.patient_id.into(),
                appointment.doctor_id.into(),
                appointment.date.as_str().into(),
                appointment.time.as_str().into(),
                appointment.status.as_str().into(),
            ],
        )?;
        let id = execution.last_insert_id;
        appointment.set_id(id);

        tracing::info!(appointment_id = id, "appointment added");
        self.subject
            .notify(&AppointmentEvent::Added(appointment.clone()));
        Ok(ScheduleOutcome::Success(id))
    }

    fn try_update(&mut self, id: i64, appointment: &Appointment) -> DbResult<ScheduleOutcome> {
        if self.get_by_id(id)?.is_none() {
            return Ok(ScheduleOutcome::NotFound);
        }
        let Some(appointment) = appointment.canonical() else {
            return Ok(invalid_slot(appointment));
        };
        let appointment = &appointment;
        if let Some(conflict) = self.find_conflict(appointment, Some(id))? {
            return Ok(conflict);
        }

        let execution = self.store.execute(
            UPDATE,
            &[
                appointment.patient_id.into(),
                appointment.doctor_id.into(),
                appointment.date.as_str().into(),
                appointment.time.as_str().into(),
                appointment.status.as_str().into(),
                id.into(),
            ],
        )?;
        // Deleted between the existence check and the write
        if execution.rows_affected == 0 {
            return Ok(ScheduleOutcome::NotFound);
        }

        let mut updated = appointment.clone();
        updated.set_id(id);

        tracing::info!(appointment_id = id, status = %updated.status, "appointment updated");
        self.subject.notify(&AppointmentEvent::Updated(updated));
        Ok(ScheduleOutcome::Success(id))
    }

    fn try_delete(&mut self, id: i64) -> DbResult<ScheduleOutcome> {
        let Some(snapshot) = self.get_by_id(id)? else {
            return Ok(ScheduleOutcome::NotFound);
        };

        self.store
            .execute("DELETE FROM appointments WHERE id = ?1", &[id.into()])?;

        tracing::info!(appointment_id = id, "appointment deleted");
        self.subject.notify(&AppointmentEvent::Deleted(snapshot));
        Ok(ScheduleOutcome::Success(id))
    }

    fn try_cancel(&mut self, id: i64) -> DbResult<ScheduleOutcome> {
        let Some(mut appointment) = self.get_by_id(id)? else {
            return Ok(ScheduleOutcome::NotFound);
        };
        if appointment.is_cancelled() {
            return Ok(ScheduleOutcome::AlreadyCancelled);
        }

        self.store.execute(
            "UPDATE appointments SET status = ?1 WHERE id = ?2",
            &[AppointmentStatus::Cancelled.as_str().into(), id.into()],
        )?;
        appointment.status = AppointmentStatus::Cancelled;

        tracing::info!(appointment_id = id, "appointment cancelled");
        self.subject
            .notify(&AppointmentEvent::Cancelled(appointment));
        Ok(ScheduleOutcome::Success(id))
    }

    /// Doctor conflicts are checked, and reported, before patient conflicts.
    fn find_conflict(
        &mut self,
        appointment: &Appointment,
        exclude: Option<i64>,
    ) -> DbResult<Option<ScheduleOutcome>> {
        let slot = |party: i64| -> [FieldValue; 5] {
            [
                appointment.date.as_str().into(),
                appointment.time.as_str().into(),
                party.into(),
                AppointmentStatus::Cancelled.as_str().into(),
                exclude.into(),
            ]
        };

        let rows = self.store.query(DOCTOR_CONFLICT, &slot(appointment.doctor_id))?;
        if count_of(&rows) > 0 {
            tracing::warn!(
                doctor_id = appointment.doctor_id,
                date = %appointment.date,
                time = %appointment.time,
                "doctor already booked for slot"
            );
            return Ok(Some(ScheduleOutcome::DoctorBusy));
        }

        let rows = self.store.query(PATIENT_CONFLICT, &slot(appointment.patient_id))?;
        if count_of(&rows) > 0 {
            tracing::warn!(
                patient_id = appointment.patient_id,
                date = %appointment.date,
                time = %appointment.time,
                "patient already booked for slot"
            );
            return Ok(Some(ScheduleOutcome::PatientBusy));
        }

        Ok(None)
    }

    fn select(&mut self, sql: &str, params: &[FieldValue]) -> DbResult<Vec<Appointment>> {
        let rows = self.store.query(sql, params)?;
        rows.iter()
            .map(Appointment::from_fields)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

/// Slots are compared as canonical text, so anything that does not parse is refused.
fn invalid_slot(appointment: &Appointment) -> ScheduleOutcome {
    tracing::warn!(
        date = %appointment.date,
        time = %appointment.time,
        "appointment slot does not parse"
    );
    ScheduleOutcome::Failed(format!(
        "invalid appointment slot: date '{}', time '{}'",
        appointment.date, appointment.time
    ))
}

fn failed(error: DbError, action: &str) -> ScheduleOutcome {
    tracing::error!(error = %error, "failed to {}", action);
    ScheduleOutcome::Failed(error.to_string())
}
