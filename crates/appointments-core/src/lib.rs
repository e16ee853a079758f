//! Appointments Core Library
//!
//! Medical appointment scheduling with double-booking prevention.
//!
//! # Architecture
//!
//! ```text
//!                      Desktop view (host shell)
//!                                │  FFI (uniffi)
//!                                ▼
//!                  ┌───────────────────────────┐
//!                  │  AppointmentViewModel     │  input validation,
//!                  │  ActionResult messages    │  display messages
//!                  └─────────────┬─────────────┘
//!                                │
//!                  ┌─────────────▼─────────────┐
//!                  │  AppointmentRepository    │  conflict checks,
//!                  │  ScheduleOutcome          │  persistence
//!                  └──────┬──────────────┬─────┘
//!                         │              │ events
//!                         ▼              ▼
//!                   Record Store     Subject ──► view-model ──► views
//!                    (SQLite)
//! ```
//!
//! # Core Principle
//!
//! **No double-booking.** A doctor or patient never has two live (not
//! cancelled) appointments at the same date and time.
//!
//! # Modules
//!
//! - [`db`]: SQLite record store, schema, patient and doctor repositories
//! - [`models`]: Domain types (Appointment, Patient, Doctor, field-mappings)
//! - [`repository`]: Appointment repository and scheduling outcomes
//! - [`notify`]: Subject/observer hub for appointment events
//! - [`viewmodel`]: Form-facing validation and messages
//! - [`config`]: Store location, resolved at startup

pub mod config;
pub mod db;
pub mod models;
pub mod notify;
pub mod repository;
pub mod viewmodel;

// Re-export commonly used types
pub use config::StoreConfig;
pub use db::{DbError, DbResult, DoctorRepository, PatientRepository, SqliteStore, Store};
pub use models::{Appointment, AppointmentStatus, Doctor, FieldValue, Fields, Patient};
pub use notify::{AppointmentEvent, Observer, Subject};
pub use repository::{AppointmentRepository, ScheduleOutcome};
pub use viewmodel::{ActionResult, AppointmentViewModel};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use db::SharedStore;

type Backend = SharedStore<SqliteStore>;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum SchedulingError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<DbError> for SchedulingError {
    fn from(e: DbError) -> Self {
        SchedulingError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for SchedulingError {
    fn from(e: serde_json::Error) -> Self {
        SchedulingError::SerializationError(e.to_string())
    }
}

impl<T> From<PoisonError<T>> for SchedulingError {
    fn from(e: PoisonError<T>) -> Self {
        SchedulingError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a scheduler database at the given path.
#[uniffi::export]
pub fn open_scheduler(path: String) -> Result<Arc<SchedulingCore>, SchedulingError> {
    SchedulingCore::open(&StoreConfig::file(path))
}

/// Create an in-memory scheduler (for testing).
#[uniffi::export]
pub fn open_scheduler_in_memory() -> Result<Arc<SchedulingCore>, SchedulingError> {
    SchedulingCore::open(&StoreConfig::in_memory())
}

/// Open the scheduler named by `APPOINTMENTS_DB_PATH` (`.env` honoured).
#[uniffi::export]
pub fn open_scheduler_from_env() -> Result<Arc<SchedulingCore>, SchedulingError> {
    SchedulingCore::open(&StoreConfig::from_env())
}

// =========================================================================
// Listener Trait (implemented by the host)
// =========================================================================

/// Receives appointment events on the host side.
#[uniffi::export(with_foreign)]
pub trait AppointmentListener: Send + Sync {
    fn on_appointment_event(&self, event: String, appointment: FfiAppointment);
}

/// Collects view-model events until the core lock is released.
///
/// Listeners run after the write returns, so they may call back into
/// [`SchedulingCore`] without deadlocking.
#[derive(Default)]
struct EventQueue {
    events: Mutex<Vec<AppointmentEvent>>,
}

impl EventQueue {
    fn drain(&self) -> Vec<AppointmentEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }
}

impl Observer for EventQueue {
    fn on_event(&self, event: &AppointmentEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe scheduler wrapper for FFI.
#[derive(uniffi::Object)]
pub struct SchedulingCore {
    store: Backend,
    /// `None` once closed
    viewmodel: Mutex<Option<AppointmentViewModel<Backend>>>,
    queue: Arc<EventQueue>,
    listeners: Mutex<Vec<(u64, Arc<dyn AppointmentListener>)>>,
    next_token: AtomicU64,
}

impl SchedulingCore {
    fn open(config: &StoreConfig) -> Result<Arc<Self>, SchedulingError> {
        let store = SqliteStore::new(config)?.into_shared();
        let repository = AppointmentRepository::new(Arc::clone(&store))?;
        let viewmodel = AppointmentViewModel::new(
            repository,
            Some(PatientRepository::new(Arc::clone(&store))),
            Some(DoctorRepository::new(Arc::clone(&store))),
        );

        let queue = Arc::new(EventQueue::default());
        viewmodel.attach_view(Arc::clone(&queue) as Arc<dyn Observer>);

        tracing::info!(path = ?config.database_path(), "scheduler opened");
        Ok(Arc::new(Self {
            store,
            viewmodel: Mutex::new(Some(viewmodel)),
            queue,
            listeners: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }))
    }

    /// Run `f` against the open view-model, then deliver queued events.
    fn with_viewmodel<T>(
        &self,
        f: impl FnOnce(&mut AppointmentViewModel<Backend>) -> Result<T, SchedulingError>,
    ) -> Result<T, SchedulingError> {
        let result = {
            let mut guard = self.viewmodel.lock()?;
            match guard.as_mut() {
                Some(viewmodel) => f(viewmodel),
                None => Err(SchedulingError::DatabaseError("scheduler is closed".into())),
            }
        };
        self.dispatch_events()?;
        result
    }

    fn dispatch_events(&self) -> Result<(), SchedulingError> {
        let events = self.queue.drain();
        if events.is_empty() {
            return Ok(());
        }
        let listeners: Vec<Arc<dyn AppointmentListener>> =
            self.listeners()?.iter().map(|(_, l)| Arc::clone(l)).collect();

        for event in events {
            let appointment = FfiAppointment::from(event.appointment().clone());
            for listener in &listeners {
                listener.on_appointment_event(event.name().to_string(), appointment.clone());
            }
        }
        Ok(())
    }

    fn listeners(
        &self,
    ) -> Result<MutexGuard<'_, Vec<(u64, Arc<dyn AppointmentListener>)>>, SchedulingError> {
        Ok(self.listeners.lock()?)
    }

    fn ensure_open(&self) -> Result<(), SchedulingError> {
        self.with_viewmodel(|_| Ok(()))
    }
}

#[uniffi::export]
impl SchedulingCore {
    // =========================================================================
    // Appointment Operations
    // =========================================================================

    /// List all appointments, ordered by date and time.
    pub fn list_appointments(&self) -> Result<Vec<FfiAppointment>, SchedulingError> {
        self.with_viewmodel(|vm| {
            let appointments = vm.appointments()?;
            Ok(appointments.into_iter().map(|a| a.into()).collect())
        })
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, id: i64) -> Result<Option<FfiAppointment>, SchedulingError> {
        self.with_viewmodel(|vm| Ok(vm.appointment(id)?.map(|a| a.into())))
    }

    /// Book a new appointment.
    pub fn create_appointment(
        &self,
        patient_id: Option<i64>,
        doctor_id: Option<i64>,
        date: String,
        time: String,
        status: String,
    ) -> Result<FfiActionResult, SchedulingError> {
        self.with_viewmodel(|vm| {
            Ok(vm
                .create(patient_id, doctor_id, &date, &time, &status)
                .into())
        })
    }

    /// Reschedule or edit an existing appointment.
    pub fn update_appointment(
        &self,
        id: i64,
        patient_id: Option<i64>,
        doctor_id: Option<i64>,
        date: String,
        time: String,
        status: String,
    ) -> Result<FfiActionResult, SchedulingError> {
        self.with_viewmodel(|vm| {
            Ok(vm
                .update(id, patient_id, doctor_id, &date, &time, &status)
                .into())
        })
    }

    pub fn delete_appointment(&self, id: i64) -> Result<FfiActionResult, SchedulingError> {
        self.with_viewmodel(|vm| Ok(vm.delete(id).into()))
    }

    pub fn cancel_appointment(&self, id: i64) -> Result<FfiActionResult, SchedulingError> {
        self.with_viewmodel(|vm| Ok(vm.cancel(id).into()))
    }

    pub fn complete_appointment(&self, id: i64) -> Result<FfiActionResult, SchedulingError> {
        self.with_viewmodel(|vm| Ok(vm.complete(id).into()))
    }

    /// Export all appointments as JSON.
    pub fn export_appointments_json(&self) -> Result<String, SchedulingError> {
        let appointments = self.with_viewmodel(|vm| Ok(vm.appointments()?))?;
        Ok(serde_json::to_string_pretty(&appointments)?)
    }

    // =========================================================================
    // Patient and Doctor Operations
    // =========================================================================

    /// Register a new patient.
    pub fn register_patient(
        &self,
        full_name: String,
        phone: String,
        email: String,
    ) -> Result<FfiPatient, SchedulingError> {
        if full_name.trim().is_empty() {
            return Err(SchedulingError::InvalidInput("patient name cannot be empty".into()));
        }
        self.ensure_open()?;

        let mut patient = Patient::new(full_name.trim());
        patient.phone = phone;
        patient.email = email;
        PatientRepository::new(Arc::clone(&self.store)).add(&mut patient)?;
        Ok(patient.into())
    }

    /// Patient with this name ignoring case, registered on the spot when
    /// there is none.
    pub fn find_or_create_patient(&self, full_name: String) -> Result<FfiPatient, SchedulingError> {
        if full_name.trim().is_empty() {
            return Err(SchedulingError::InvalidInput("patient name cannot be empty".into()));
        }
        self.ensure_open()?;

        let patient =
            PatientRepository::new(Arc::clone(&self.store)).find_or_create_by_name(&full_name)?;
        Ok(patient.into())
    }

    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, SchedulingError> {
        self.with_viewmodel(|vm| Ok(vm.patients()?.into_iter().map(|p| p.into()).collect()))
    }

    /// Register a new doctor.
    pub fn register_doctor(
        &self,
        full_name: String,
        specialty: String,
        phone: String,
    ) -> Result<FfiDoctor, SchedulingError> {
        if full_name.trim().is_empty() {
            return Err(SchedulingError::InvalidInput("doctor name cannot be empty".into()));
        }
        self.ensure_open()?;

        let mut doctor = Doctor::new(full_name.trim());
        doctor.specialty = specialty;
        doctor.phone = phone;
        DoctorRepository::new(Arc::clone(&self.store)).add(&mut doctor)?;
        Ok(doctor.into())
    }

    pub fn list_doctors(&self) -> Result<Vec<FfiDoctor>, SchedulingError> {
        self.with_viewmodel(|vm| Ok(vm.doctors()?.into_iter().map(|d| d.into()).collect()))
    }

    // =========================================================================
    // Listeners and Lifecycle
    // =========================================================================

    /// Attach a listener; the returned token detaches it.
    pub fn attach_listener(
        &self,
        listener: Arc<dyn AppointmentListener>,
    ) -> Result<u64, SchedulingError> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.listeners()?.push((token, listener));
        Ok(token)
    }

    /// Detach a listener. Returns false for an unknown token.
    pub fn detach_listener(&self, token: u64) -> Result<bool, SchedulingError> {
        let mut listeners = self.listeners()?;
        let before = listeners.len();
        listeners.retain(|(t, _)| *t != token);
        Ok(listeners.len() != before)
    }

    /// Release the database connection. Later calls fail.
    pub fn close(&self) -> Result<(), SchedulingError> {
        let viewmodel = self.viewmodel.lock()?.take();
        if let Some(viewmodel) = viewmodel {
            viewmodel.close()?;
            tracing::info!("scheduler closed");
        }
        Ok(())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe appointment.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiAppointment {
    pub id: Option<i64>,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub date: String,
    pub time: String,
    pub status: String,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
}

impl From<Appointment> for FfiAppointment {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id(),
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            status: appointment.status.to_string(),
            date: appointment.date,
            time: appointment.time,
            patient_name: appointment.patient_name,
            doctor_name: appointment.doctor_name,
        }
    }
}

/// FFI-safe action result.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiActionResult {
    pub success: bool,
    pub message: String,
}

impl From<ActionResult> for FfiActionResult {
    fn from(result: ActionResult) -> Self {
        Self {
            success: result.success,
            message: result.message,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: Option<i64>,
    pub full_name: String,
    pub phone: String,
    pub email: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id(),
            full_name: patient.full_name,
            phone: patient.phone,
            email: patient.email,
        }
    }
}

/// FFI-safe doctor.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctor {
    pub id: Option<i64>,
    pub full_name: String,
    pub specialty: String,
    pub phone: String,
}

impl From<Doctor> for FfiDoctor {
    fn from(doctor: Doctor) -> Self {
        Self {
            id: doctor.id(),
            full_name: doctor.full_name,
            specialty: doctor.specialty,
            phone: doctor.phone,
        }
    }
}
