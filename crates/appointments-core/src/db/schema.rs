//! SQLite schema definition.

/// Complete database schema for appointment scheduling.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT NOT NULL,
    phone TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(full_name);

-- ============================================================================
-- Doctors
-- ============================================================================

CREATE TABLE IF NOT EXISTS doctors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT NOT NULL,
    specialty TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_doctors_name ON doctors(full_name);

-- ============================================================================
-- Appointments
-- ============================================================================

-- No unique constraint on the slot: cancelled rows keep their slot and the
-- repository performs the double-booking check.
CREATE TABLE IF NOT EXISTS appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL REFERENCES patients(id),
    doctor_id INTEGER NOT NULL REFERENCES doctors(id),
    date TEXT NOT NULL,                          -- YYYY-MM-DD
    time TEXT NOT NULL,                          -- HH:MM
    status TEXT NOT NULL DEFAULT 'Scheduled'
        CHECK (status IN ('Scheduled', 'Completed', 'Cancelled'))
);

-- Indexes backing the conflict checks
CREATE INDEX IF NOT EXISTS idx_appointments_doctor_slot ON appointments(date, time, doctor_id);
CREATE INDEX IF NOT EXISTS idx_appointments_patient_slot ON appointments(date, time, patient_id);
"#;

/// Tables and columns the scheduler cannot run without.
pub const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("patients", &["id", "full_name"]),
    ("doctors", &["id", "full_name"]),
    (
        "appointments",
        &["id", "patient_id", "doctor_id", "date", "time", "status"],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute("INSERT INTO patients (full_name) VALUES ('Ana Lopez')", [])
            .unwrap();
        conn.execute("INSERT INTO doctors (full_name) VALUES ('Luis Vega')", [])
            .unwrap();
        conn
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);

        // Re-applying is a no-op
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_status_constraint() {
        let conn = setup();

        let result = conn.execute(
            "INSERT INTO appointments (patient_id, doctor_id, date, time, status) VALUES (1, 1, '2024-06-10', '09:00', 'Postponed')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO appointments (patient_id, doctor_id, date, time) VALUES (1, 1, '2024-06-10', '09:00')",
            [],
        );
        assert!(result.is_ok());

        let status: String = conn
            .query_row("SELECT status FROM appointments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "Scheduled");
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let conn = setup();

        // Unknown patient
        let result = conn.execute(
            "INSERT INTO appointments (patient_id, doctor_id, date, time) VALUES (99, 1, '2024-06-10', '09:00')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_slot_is_not_unique() {
        let conn = setup();

        for _ in 0..2 {
            conn.execute(
                "INSERT INTO appointments (patient_id, doctor_id, date, time, status) VALUES (1, 1, '2024-06-10', '09:00', 'Cancelled')",
                [],
            )
            .unwrap();
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
