//! Subject/observer hub for appointment events.
//!
//! Observers are notified synchronously, in attachment order. Notification
//! iterates over a snapshot of the observer list, so a handler may attach or
//! detach observers without affecting the round in progress.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::models::Appointment;

/// A change to the appointment table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentEvent {
    Added(Appointment),
    Updated(Appointment),
    Cancelled(Appointment),
    /// Carries the row as it was before deletion
    Deleted(Appointment),
}

impl AppointmentEvent {
    pub const ADDED: &'static str = "appointment_added";
    pub const UPDATED: &'static str = "appointment_updated";
    pub const CANCELLED: &'static str = "appointment_cancelled";
    pub const DELETED: &'static str = "appointment_deleted";

    /// Event name as seen by listeners.
    pub fn name(&self) -> &'static str {
        match self {
            AppointmentEvent::Added(_) => Self::ADDED,
            AppointmentEvent::Updated(_) => Self::UPDATED,
            AppointmentEvent::Cancelled(_) => Self::CANCELLED,
            AppointmentEvent::Deleted(_) => Self::DELETED,
        }
    }

    pub fn appointment(&self) -> &Appointment {
        match self {
            AppointmentEvent::Added(a)
            | AppointmentEvent::Updated(a)
            | AppointmentEvent::Cancelled(a)
            | AppointmentEvent::Deleted(a) => a,
        }
    }
}

/// Receives appointment events from a [`Subject`].
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &AppointmentEvent);
}

impl<F> Observer for F
where
    F: Fn(&AppointmentEvent) + Send + Sync,
{
    fn on_event(&self, event: &AppointmentEvent) {
        self(event)
    }
}

/// Ordered, duplicate-free set of observers.
#[derive(Default)]
pub struct Subject {
    observers: Mutex<Vec<Arc<dyn Observer>>>,
}

impl Subject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer. Attaching one that is already present is a no-op.
    pub fn attach(&self, observer: Arc<dyn Observer>) {
        let mut observers = self.observers();
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    /// Detach an observer. Detaching one that is absent is a no-op.
    pub fn detach(&self, observer: &Arc<dyn Observer>) {
        self.observers().retain(|o| !Arc::ptr_eq(o, observer));
    }

    pub fn notify(&self, event: &AppointmentEvent) {
        let snapshot: Vec<Arc<dyn Observer>> = self.observers().clone();
        for observer in snapshot {
            observer.on_event(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panicking observer must not take the hub down with it.
    fn observers(&self) -> MutexGuard<'_, Vec<Arc<dyn Observer>>> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.len())
            .finish()
    }
}
