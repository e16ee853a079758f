//! Record store contract and its SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection};

use super::{DbError, DbResult, SCHEMA};
use crate::config::StoreConfig;
use crate::models::{FieldValue, Fields, DATE_FORMAT, TIME_FORMAT};

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    pub rows_affected: usize,
    /// Row ID generated by the last successful insert on this connection.
    pub last_insert_id: i64,
}

/// Parameterized access to the persistent tables.
///
/// `query` returns every row as a field-mapping. `execute` runs a single
/// write in its own transaction: committed on success, rolled back on error.
pub trait Store {
    fn connect(&mut self) -> DbResult<()>;

    fn is_connected(&self) -> bool;

    fn close(&mut self) -> DbResult<()>;

    fn query(&mut self, sql: &str, params: &[FieldValue]) -> DbResult<Vec<Fields>>;

    fn execute(&mut self, sql: &str, params: &[FieldValue]) -> DbResult<Execution>;
}

/// A store handle shared by several repositories.
pub type SharedStore<S> = Arc<Mutex<S>>;

/// SQLite-backed record store holding a single, lazily opened connection.
pub struct SqliteStore {
    /// `None` for an in-memory database
    path: Option<PathBuf>,
    conn: Option<Connection>,
}

impl SqliteStore {
    /// Open the store described by `config`.
    pub fn new(config: &StoreConfig) -> DbResult<Self> {
        let mut store = Self {
            path: config.database_path().map(Path::to_path_buf),
            conn: None,
        };
        store.connect()?;
        Ok(store)
    }

    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::new(&StoreConfig::file(path.as_ref()))
    }

    /// Create in-memory database (for testing).
    ///
    /// Closing an in-memory store discards its contents; a later reconnect
    /// starts from an empty schema.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::new(&StoreConfig::in_memory())
    }

    pub fn into_shared(self) -> SharedStore<Self> {
        Arc::new(Mutex::new(self))
    }

    fn open_connection(&self) -> DbResult<Connection> {
        let conn = match &self.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = ?self.path, "record store connected");
        Ok(conn)
    }

    /// Cached connection, reopened transparently when absent.
    fn connection(&mut self) -> DbResult<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                tracing::debug!(path = ?self.path, "record store disconnected, reconnecting");
                self.open_connection()?
            }
        };
        Ok(self.conn.insert(conn))
    }
}

impl Store for SqliteStore {
    fn connect(&mut self) -> DbResult<()> {
        if self.conn.is_none() {
            self.conn = Some(self.open_connection()?);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn close(&mut self) -> DbResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| DbError::Sqlite(e))?;
            tracing::debug!(path = ?self.path, "record store closed");
        }
        Ok(())
    }

    fn query(&mut self, sql: &str, params: &[FieldValue]) -> DbResult<Vec<Fields>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let mut fields = Fields::new();
            for (idx, name) in columns.iter().enumerate() {
                fields.insert(name.clone(), field_from_sql(row.get_ref(idx)?));
            }
            Ok(fields)
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn execute(&mut self, sql: &str, params: &[FieldValue]) -> DbResult<Execution> {
        let conn = self.connection()?;
        // Dropping the transaction on an early return rolls it back.
        let tx = conn.transaction()?;
        let rows_affected = tx.execute(sql, params_from_iter(params.iter()))?;
        let last_insert_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Execution {
            rows_affected,
            last_insert_id,
        })
    }
}

impl<S: Store> Store for Arc<Mutex<S>> {
    fn connect(&mut self) -> DbResult<()> {
        lock(self)?.connect()
    }

    fn is_connected(&self) -> bool {
        lock(self).map(|store| store.is_connected()).unwrap_or(false)
    }

    fn close(&mut self) -> DbResult<()> {
        lock(self)?.close()
    }

    fn query(&mut self, sql: &str, params: &[FieldValue]) -> DbResult<Vec<Fields>> {
        lock(self)?.query(sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[FieldValue]) -> DbResult<Execution> {
        lock(self)?.execute(sql, params)
    }
}

fn lock<S>(store: &Mutex<S>) -> DbResult<MutexGuard<'_, S>> {
    store.lock().map_err(|_| DbError::LockPoisoned)
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            FieldValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            FieldValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
            FieldValue::Date(d) => {
                ToSqlOutput::Owned(Value::Text(d.format(DATE_FORMAT).to_string()))
            }
            FieldValue::Time(t) => {
                ToSqlOutput::Owned(Value::Text(t.format(TIME_FORMAT).to_string()))
            }
            FieldValue::DateTime(dt) => ToSqlOutput::Owned(Value::Text(
                dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            )),
        })
    }
}

fn field_from_sql(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Integer(i),
        ValueRef::Real(r) => FieldValue::Real(r),
        ValueRef::Text(bytes) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => FieldValue::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_query_returns_named_fields() {
        let mut store = setup_store();
        store
            .execute(
                "INSERT INTO patients (full_name, email) VALUES (?1, ?2)",
                &["Ana Lopez".into(), "ana@example.com".into()],
            )
            .unwrap();

        let rows = store
            .query("SELECT id, full_name, phone FROM patients", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[0]["id"], FieldValue::Integer(1));
        assert_eq!(rows[0]["full_name"], FieldValue::Text("Ana Lopez".into()));
        assert_eq!(rows[0]["phone"], FieldValue::Text(String::new()));
    }

    #[test]
    fn test_execute_reports_insert_id() {
        let mut store = setup_store();

        let first = store
            .execute("INSERT INTO doctors (full_name) VALUES (?1)", &["A".into()])
            .unwrap();
        let second = store
            .execute("INSERT INTO doctors (full_name) VALUES (?1)", &["B".into()])
            .unwrap();

        assert_eq!(first.rows_affected, 1);
        assert_eq!(second.last_insert_id, first.last_insert_id + 1);
    }

    #[test]
    fn test_failed_execute_rolls_back() {
        let mut store = setup_store();

        let result = store.execute(
            "INSERT INTO doctors (full_name) VALUES (?1)",
            &[FieldValue::Null],
        );
        assert!(result.is_err());

        let rows = store.query("SELECT id FROM doctors", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_native_date_params_bind_as_text() {
        let mut store = setup_store();
        store
            .execute("INSERT INTO patients (full_name) VALUES ('P')", &[])
            .unwrap();
        store
            .execute("INSERT INTO doctors (full_name) VALUES ('D')", &[])
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let time = date.and_hms_opt(9, 0, 0).unwrap().time();
        store
            .execute(
                "INSERT INTO appointments (patient_id, doctor_id, date, time) VALUES (1, 1, ?1, ?2)",
                &[date.into(), time.into()],
            )
            .unwrap();

        let rows = store
            .query("SELECT date, time FROM appointments", &[])
            .unwrap();
        assert_eq!(rows[0]["date"], FieldValue::Text("2024-06-10".into()));
        assert_eq!(rows[0]["time"], FieldValue::Text("09:00".into()));
    }

    #[test]
    fn test_close_and_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path().join("appointments.db")).unwrap();
        assert!(store.is_connected());

        store
            .execute("INSERT INTO patients (full_name) VALUES ('Ana Lopez')", &[])
            .unwrap();
        store.close().unwrap();
        assert!(!store.is_connected());

        // Any accessor reconnects transparently
        let rows = store.query("SELECT full_name FROM patients", &[]).unwrap();
        assert!(store.is_connected());
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_shared_store_delegates() {
        let mut shared = setup_store().into_shared();
        let mut other = Arc::clone(&shared);

        shared
            .execute("INSERT INTO doctors (full_name) VALUES ('Luis Vega')", &[])
            .unwrap();
        let rows = other.query("SELECT full_name FROM doctors", &[]).unwrap();

        assert_eq!(rows.len(), 1);
        assert!(other.is_connected());
    }
}
