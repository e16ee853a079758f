//! Store configuration.
//!
//! Resolved once at startup and passed to [`SqliteStore::new`]. Nothing below
//! the FFI layer reads environment variables on its own.
//!
//! [`SqliteStore::new`]: crate::db::SqliteStore::new

use std::path::{Path, PathBuf};

/// Environment variable naming the database file.
pub const DB_PATH_VAR: &str = "APPOINTMENTS_DB_PATH";

/// Database file used when [`DB_PATH_VAR`] is unset or empty.
pub const DEFAULT_DB_PATH: &str = "appointments.db";

/// Value of [`DB_PATH_VAR`] that selects an in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// Where the record store keeps its data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// `None` for an in-memory database
    database_path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            database_path: None,
        }
    }

    /// Load `.env` if present, then read [`DB_PATH_VAR`].
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to load .env file");
            }
        }
        let value = std::env::var(DB_PATH_VAR).ok();
        Self::from_value(value.as_deref())
    }

    /// Interpret a raw [`DB_PATH_VAR`] value.
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::file(DEFAULT_DB_PATH),
            Some(IN_MEMORY) => Self::in_memory(),
            Some(path) => Self::file(path),
        }
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.is_none()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::file(DEFAULT_DB_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_uses_default_file() {
        let config = StoreConfig::from_value(None);
        assert_eq!(config.database_path(), Some(Path::new("appointments.db")));
        assert_eq!(StoreConfig::from_value(Some("  ")), config);
        assert_eq!(StoreConfig::default(), config);
    }

    #[test]
    fn test_memory_marker() {
        let config = StoreConfig::from_value(Some(":memory:"));
        assert!(config.is_in_memory());
        assert_eq!(config.database_path(), None);
    }

    #[test]
    fn test_explicit_path() {
        let config = StoreConfig::from_value(Some("/var/lib/clinic/appointments.db"));
        assert!(!config.is_in_memory());
        assert_eq!(
            config.database_path(),
            Some(Path::new("/var/lib/clinic/appointments.db"))
        );
    }
}
