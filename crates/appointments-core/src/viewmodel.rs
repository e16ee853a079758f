//! Appointment view-model.
//!
//! Sits between a form/list view and the [`AppointmentRepository`]. Input is
//! validated against the patient and doctor lookups and the date/time
//! formats before any scheduling write, and every write is answered with an
//! [`ActionResult`] the view can show as-is.
//!
//! The view-model also relays every repository event to its own view
//! observers, so views never subscribe to the repository directly.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::db::{DbResult, DoctorRepository, PatientRepository, Store};
use crate::models::{Appointment, Doctor, Patient, DATE_FORMAT, TIME_FORMAT};
use crate::notify::{AppointmentEvent, Observer, Subject};
use crate::repository::{AppointmentRepository, ScheduleOutcome};

/// User-facing messages.
pub mod messages {
    pub const MISSING_PATIENT: &str = "A patient must be selected";
    pub const MISSING_DOCTOR: &str = "A doctor must be selected";
    pub const UNKNOWN_PATIENT: &str = "The selected patient does not exist";
    pub const UNKNOWN_DOCTOR: &str = "The selected doctor does not exist";
    pub const PATIENT_LOOKUP_FAILED: &str = "Could not verify the selected patient";
    pub const DOCTOR_LOOKUP_FAILED: &str = "Could not verify the selected doctor";
    pub const INVALID_DATE: &str = "Invalid date format. Use YYYY-MM-DD";
    pub const INVALID_TIME: &str = "Invalid time format. Use HH:MM";

    pub const DOCTOR_BUSY: &str =
        "The doctor already has an appointment scheduled at that date and time";
    pub const PATIENT_BUSY: &str =
        "The patient already has an appointment scheduled at that date and time";
    pub const DOCTOR_BUSY_OTHER: &str =
        "The doctor already has another appointment scheduled at that date and time";
    pub const PATIENT_BUSY_OTHER: &str =
        "The patient already has another appointment scheduled at that date and time";

    pub const NOT_FOUND: &str = "The appointment does not exist";
    pub const ALREADY_CANCELLED: &str = "The appointment is already cancelled";
    pub const ALREADY_COMPLETED: &str = "The appointment is already completed";
    pub const LOOKUP_FAILED: &str = "Could not load the appointment";

    pub const CREATE_FAILED: &str = "Could not create the appointment";
    pub const UPDATE_FAILED: &str = "Could not update the appointment";
    pub const DELETE_FAILED: &str = "Could not delete the appointment";
    pub const CANCEL_FAILED: &str = "Could not cancel the appointment";
    pub const COMPLETE_FAILED: &str = "Could not complete the appointment";
}

/// Outcome of a view-model write, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Forwards repository events to the view-model's observers.
struct ViewRelay {
    views: Arc<Subject>,
}

impl Observer for ViewRelay {
    fn on_event(&self, event: &AppointmentEvent) {
        self.views.notify(event);
    }
}

pub struct AppointmentViewModel<S: Store> {
    repository: AppointmentRepository<S>,
    patients: Option<PatientRepository<S>>,
    doctors: Option<DoctorRepository<S>>,
    views: Arc<Subject>,
    relay: Arc<dyn Observer>,
}

impl<S: Store> AppointmentViewModel<S> {
    /// Build a view-model over `repository`. Without a patient or doctor
    /// lookup, the matching existence check is skipped.
    pub fn new(
        repository: AppointmentRepository<S>,
        patients: Option<PatientRepository<S>>,
        doctors: Option<DoctorRepository<S>>,
    ) -> Self {
        let views = Arc::new(Subject::new());
        let relay: Arc<dyn Observer> = Arc::new(ViewRelay {
            views: Arc::clone(&views),
        });
        repository.subscribe(Arc::clone(&relay));

        Self {
            repository,
            patients,
            doctors,
            views,
            relay,
        }
    }

    pub fn attach_view(&self, observer: Arc<dyn Observer>) {
        self.views.attach(observer);
    }

    pub fn detach_view(&self, observer: &Arc<dyn Observer>) {
        self.views.detach(observer);
    }

    pub fn appointments(&mut self) -> DbResult<Vec<Appointment>> {
        self.repository.get_all()
    }

    pub fn appointment(&mut self, id: i64) -> DbResult<Option<Appointment>> {
        self.repository.get_by_id(id)
    }

    /// All patients, or none when no patient lookup is configured.
    pub fn patients(&mut self) -> DbResult<Vec<Patient>> {
        match self.patients.as_mut() {
            Some(repo) => repo.get_all(),
            None => Ok(Vec::new()),
        }
    }

    /// All doctors, or none when no doctor lookup is configured.
    pub fn doctors(&mut self) -> DbResult<Vec<Doctor>> {
        match self.doctors.as_mut() {
            Some(repo) => repo.get_all(),
            None => Ok(Vec::new()),
        }
    }

    pub fn create(
        &mut self,
        patient_id: Option<i64>,
        doctor_id: Option<i64>,
        date: &str,
        time: &str,
        status: &str,
    ) -> ActionResult {
        let mut appointment = match self.validate(patient_id, doctor_id, date, time, status) {
            Ok(appointment) => appointment,
            Err(declined) => return declined,
        };

        match self.repository.add(&mut appointment) {
            ScheduleOutcome::Success(id) => {
                ActionResult::ok(format!("Appointment #{} created successfully", id))
            }
            ScheduleOutcome::DoctorBusy => ActionResult::declined(messages::DOCTOR_BUSY),
            ScheduleOutcome::PatientBusy => ActionResult::declined(messages::PATIENT_BUSY),
            _ => ActionResult::declined(messages::CREATE_FAILED),
        }
    }

    pub fn update(
        &mut self,
        id: i64,
        patient_id: Option<i64>,
        doctor_id: Option<i64>,
        date: &str,
        time: &str,
        status: &str,
    ) -> ActionResult {
        if let Err(declined) = self.require_existing(id) {
            return declined;
        }
        let appointment = match self.validate(patient_id, doctor_id, date, time, status) {
            Ok(appointment) => appointment,
            Err(declined) => return declined,
        };

        match self.repository.update(id, &appointment) {
            ScheduleOutcome::Success(id) => {
                ActionResult::ok(format!("Appointment #{} updated successfully", id))
            }
            ScheduleOutcome::DoctorBusy => ActionResult::declined(messages::DOCTOR_BUSY_OTHER),
            ScheduleOutcome::PatientBusy => ActionResult::declined(messages::PATIENT_BUSY_OTHER),
            ScheduleOutcome::NotFound => ActionResult::declined(messages::NOT_FOUND),
            _ => ActionResult::declined(messages::UPDATE_FAILED),
        }
    }

    pub fn delete(&mut self, id: i64) -> ActionResult {
        match self.repository.delete(id) {
            ScheduleOutcome::Success(id) => {
                ActionResult::ok(format!("Appointment #{} deleted successfully", id))
            }
            ScheduleOutcome::NotFound => ActionResult::declined(messages::NOT_FOUND),
            _ => ActionResult::declined(messages::DELETE_FAILED),
        }
    }

    pub fn cancel(&mut self, id: i64) -> ActionResult {
        match self.repository.cancel(id) {
            ScheduleOutcome::Success(id) => {
                ActionResult::ok(format!("Appointment #{} cancelled successfully", id))
            }
            ScheduleOutcome::NotFound => ActionResult::declined(messages::NOT_FOUND),
            ScheduleOutcome::AlreadyCancelled => {
                ActionResult::declined(messages::ALREADY_CANCELLED)
            }
            _ => ActionResult::declined(messages::CANCEL_FAILED),
        }
    }

    pub fn complete(&mut self, id: i64) -> ActionResult {
        match self.repository.complete(id) {
            ScheduleOutcome::Success(id) => {
                ActionResult::ok(format!("Appointment #{} marked as completed", id))
            }
            ScheduleOutcome::NotFound => ActionResult::declined(messages::NOT_FOUND),
            ScheduleOutcome::AlreadyCompleted => {
                ActionResult::declined(messages::ALREADY_COMPLETED)
            }
            ScheduleOutcome::DoctorBusy => ActionResult::declined(messages::DOCTOR_BUSY_OTHER),
            ScheduleOutcome::PatientBusy => ActionResult::declined(messages::PATIENT_BUSY_OTHER),
            _ => ActionResult::declined(messages::COMPLETE_FAILED),
        }
    }

    /// Detach from the repository and release the store connection.
    pub fn close(self) -> DbResult<()> {
        self.repository.unsubscribe(&self.relay);
        self.repository.close()
    }

    fn require_existing(&mut self, id: i64) -> Result<(), ActionResult> {
        if id <= 0 {
            return Err(ActionResult::declined(messages::NOT_FOUND));
        }
        match self.repository.get_by_id(id) {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(ActionResult::declined(messages::NOT_FOUND)),
            Err(e) => {
                tracing::error!(appointment_id = id, error = %e, "failed to load appointment");
                Err(ActionResult::declined(messages::LOOKUP_FAILED))
            }
        }
    }

    /// Run the input checks in order and build the canonical appointment.
    fn validate(
        &mut self,
        patient_id: Option<i64>,
        doctor_id: Option<i64>,
        date: &str,
        time: &str,
        status: &str,
    ) -> Result<Appointment, ActionResult> {
        let patient_id = selected(patient_id)
            .ok_or_else(|| ActionResult::declined(messages::MISSING_PATIENT))?;
        let doctor_id =
            selected(doctor_id).ok_or_else(|| ActionResult::declined(messages::MISSING_DOCTOR))?;

        if let Some(repo) = self.patients.as_mut() {
            match repo.get_by_id(patient_id) {
                Ok(Some(_)) => {}
                Ok(None) => return Err(ActionResult::declined(messages::UNKNOWN_PATIENT)),
                Err(e) => {
                    tracing::error!(patient_id, error = %e, "patient lookup failed");
                    return Err(ActionResult::declined(messages::PATIENT_LOOKUP_FAILED));
                }
            }
        }

        if let Some(repo) = self.doctors.as_mut() {
            match repo.get_by_id(doctor_id) {
                Ok(Some(_)) => {}
                Ok(None) => return Err(ActionResult::declined(messages::UNKNOWN_DOCTOR)),
                Err(e) => {
                    tracing::error!(doctor_id, error = %e, "doctor lookup failed");
                    return Err(ActionResult::declined(messages::DOCTOR_LOOKUP_FAILED));
                }
            }
        }

        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
            .map_err(|_| ActionResult::declined(messages::INVALID_DATE))?;
        let time = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT)
            .map_err(|_| ActionResult::declined(messages::INVALID_TIME))?;

        Ok(Appointment::at(patient_id, doctor_id, date, time).with_status_label(status))
    }
}

/// Absent and non-positive IDs mean nothing was selected.
fn selected(id: Option<i64>) -> Option<i64> {
    id.filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SharedStore, SqliteStore};
    use crate::models::AppointmentStatus;
    use std::sync::Mutex;

    type Shared = SharedStore<SqliteStore>;

    fn seeded_store() -> Shared {
        let store = SqliteStore::open_in_memory().unwrap().into_shared();
        let mut patients = PatientRepository::new(Arc::clone(&store));
        patients.add(&mut Patient::new("Ana Lopez")).unwrap();
        patients.add(&mut Patient::new("Bruno Diaz")).unwrap();
        let mut doctors = DoctorRepository::new(Arc::clone(&store));
        doctors.add(&mut Doctor::new("Luis Vega")).unwrap();
        doctors.add(&mut Doctor::new("Marta Sol")).unwrap();
        store
    }

    fn setup() -> AppointmentViewModel<Shared> {
        let store = seeded_store();
        AppointmentViewModel::new(
            AppointmentRepository::new(Arc::clone(&store)).unwrap(),
            Some(PatientRepository::new(Arc::clone(&store))),
            Some(DoctorRepository::new(store)),
        )
    }

    fn event_log(vm: &AppointmentViewModel<Shared>) -> Arc<Mutex<Vec<&'static str>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        vm.attach_view(Arc::new(move |event: &AppointmentEvent| {
            sink.lock().unwrap().push(event.name());
        }));
        log
    }

    #[test]
    fn test_create_success() {
        let mut vm = setup();
        let log = event_log(&vm);

        let result = vm.create(Some(1), Some(1), "2024-06-10", "09:00", "Scheduled");

        assert_eq!(result, ActionResult::ok("Appointment #1 created successfully"));
        assert_eq!(*log.lock().unwrap(), vec!["appointment_added"]);
    }

    #[test]
    fn test_create_validation_order() {
        let mut vm = setup();

        let cases = [
            (None, None, "bad", "bad", messages::MISSING_PATIENT),
            (Some(0), Some(1), "2024-06-10", "09:00", messages::MISSING_PATIENT),
            (Some(1), None, "bad", "bad", messages::MISSING_DOCTOR),
            (Some(1), Some(-3), "2024-06-10", "09:00", messages::MISSING_DOCTOR),
            (Some(9), Some(9), "bad", "bad", messages::UNKNOWN_PATIENT),
            (Some(1), Some(9), "bad", "bad", messages::UNKNOWN_DOCTOR),
            (Some(1), Some(1), "10/06/2024", "bad", messages::INVALID_DATE),
            (Some(1), Some(1), "2024-02-30", "09:00", messages::INVALID_DATE),
            (Some(1), Some(1), "2024-06-10", "9am", messages::INVALID_TIME),
            (Some(1), Some(1), "2024-06-10", "25:00", messages::INVALID_TIME),
        ];

        for (patient, doctor, date, time, expected) in cases {
            let result = vm.create(patient, doctor, date, time, "Scheduled");
            assert_eq!(result, ActionResult::declined(expected), "{date} {time}");
        }
        assert!(vm.appointments().unwrap().is_empty());
    }

    #[test]
    fn test_create_normalizes_input() {
        let mut vm = setup();

        let result = vm.create(Some(1), Some(1), " 2024-6-1 ", "9:05", "completed");
        assert!(result.success, "{}", result.message);

        let stored = vm.appointment(1).unwrap().unwrap();
        assert_eq!(stored.date, "2024-06-01");
        assert_eq!(stored.time, "09:05");
        assert_eq!(stored.status, AppointmentStatus::Completed);
    }

    #[test]
    fn test_create_conflicts() {
        let mut vm = setup();
        vm.create(Some(1), Some(1), "2024-06-10", "09:00", "Scheduled");

        let doctor_clash = vm.create(Some(2), Some(1), "2024-06-10", "09:00", "Scheduled");
        assert_eq!(doctor_clash, ActionResult::declined(messages::DOCTOR_BUSY));

        let patient_clash = vm.create(Some(1), Some(2), "2024-06-10", "09:00", "Scheduled");
        assert_eq!(patient_clash, ActionResult::declined(messages::PATIENT_BUSY));
    }

    #[test]
    fn test_update_checks_existence_first() {
        let mut vm = setup();

        // Missing appointment wins over every other problem with the input
        let result = vm.update(42, None, None, "bad", "bad", "Scheduled");
        assert_eq!(result, ActionResult::declined(messages::NOT_FOUND));
        assert_eq!(
            vm.update(0, Some(1), Some(1), "2024-06-10", "09:00", "Scheduled"),
            ActionResult::declined(messages::NOT_FOUND)
        );
    }

    #[test]
    fn test_update_messages() {
        let mut vm = setup();
        vm.create(Some(1), Some(1), "2024-06-10", "09:00", "Scheduled");
        vm.create(Some(2), Some(2), "2024-06-10", "10:00", "Scheduled");

        let clash = vm.update(2, Some(2), Some(1), "2024-06-10", "09:00", "Scheduled");
        assert_eq!(clash, ActionResult::declined(messages::DOCTOR_BUSY_OTHER));

        let clash = vm.update(2, Some(1), Some(2), "2024-06-10", "09:00", "Scheduled");
        assert_eq!(clash, ActionResult::declined(messages::PATIENT_BUSY_OTHER));

        let moved = vm.update(2, Some(2), Some(2), "2024-06-11", "10:00", "Scheduled");
        assert_eq!(moved, ActionResult::ok("Appointment #2 updated successfully"));
    }

    #[test]
    fn test_delete_cancel_complete() {
        let mut vm = setup();
        vm.create(Some(1), Some(1), "2024-06-10", "09:00", "Scheduled");
        vm.create(Some(2), Some(2), "2024-06-10", "09:00", "Scheduled");

        assert_eq!(vm.complete(2), ActionResult::ok("Appointment #2 marked as completed"));
        assert_eq!(vm.complete(2), ActionResult::declined(messages::ALREADY_COMPLETED));
        assert_eq!(vm.cancel(1), ActionResult::ok("Appointment #1 cancelled successfully"));
        assert_eq!(vm.cancel(1), ActionResult::declined(messages::ALREADY_CANCELLED));
        assert_eq!(vm.delete(1), ActionResult::ok("Appointment #1 deleted successfully"));
        assert_eq!(vm.delete(1), ActionResult::declined(messages::NOT_FOUND));
        assert_eq!(vm.cancel(1), ActionResult::declined(messages::NOT_FOUND));
        assert_eq!(vm.complete(1), ActionResult::declined(messages::NOT_FOUND));
    }

    #[test]
    fn test_relays_events_to_views() {
        let mut vm = setup();
        let log = event_log(&vm);

        vm.create(Some(1), Some(1), "2024-06-10", "09:00", "Scheduled");
        vm.update(1, Some(1), Some(1), "2024-06-10", "11:00", "Scheduled");
        vm.cancel(1);
        vm.delete(1);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "appointment_added",
                "appointment_updated",
                "appointment_cancelled",
                "appointment_deleted"
            ]
        );
    }

    #[test]
    fn test_detached_view_stops_receiving() {
        let mut vm = setup();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let view: Arc<dyn Observer> = Arc::new(move |_: &AppointmentEvent| {
            *sink.lock().unwrap() += 1;
        });

        vm.attach_view(Arc::clone(&view));
        vm.create(Some(1), Some(1), "2024-06-10", "09:00", "Scheduled");
        vm.detach_view(&view);
        vm.cancel(1);

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_without_lookups() {
        let store = seeded_store();
        let mut vm = AppointmentViewModel::new(
            AppointmentRepository::new(Arc::clone(&store)).unwrap(),
            None,
            None,
        );

        assert!(vm.patients().unwrap().is_empty());
        assert!(vm.doctors().unwrap().is_empty());

        // Existence checks are skipped, so the foreign key rejects the write
        let result = vm.create(Some(9), Some(9), "2024-06-10", "09:00", "Scheduled");
        assert_eq!(result, ActionResult::declined(messages::CREATE_FAILED));
    }

    #[test]
    fn test_lookup_failure_declines() {
        let store = seeded_store();
        let mut vm = setup_over(&store);
        store
            .lock()
            .unwrap()
            .execute("ALTER TABLE patients RENAME TO patients_old", &[])
            .unwrap();

        let result = vm.create(Some(1), Some(1), "2024-06-10", "09:00", "Scheduled");
        assert_eq!(result, ActionResult::declined(messages::PATIENT_LOOKUP_FAILED));
    }

    fn setup_over(store: &Shared) -> AppointmentViewModel<Shared> {
        AppointmentViewModel::new(
            AppointmentRepository::new(Arc::clone(store)).unwrap(),
            Some(PatientRepository::new(Arc::clone(store))),
            Some(DoctorRepository::new(Arc::clone(store))),
        )
    }

    #[test]
    fn test_read_helpers() {
        let mut vm = setup();
        vm.create(Some(2), Some(1), "2024-06-10", "09:00", "Scheduled");

        assert_eq!(vm.patients().unwrap().len(), 2);
        assert_eq!(vm.doctors().unwrap().len(), 2);
        let listed = vm.appointments().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].patient_name.as_deref(), Some("Bruno Diaz"));
        assert!(vm.appointment(99).unwrap().is_none());
    }

    #[test]
    fn test_close() {
        let store = seeded_store();
        let vm = setup_over(&store);

        vm.close().unwrap();
        assert!(!store.is_connected());
    }
}
