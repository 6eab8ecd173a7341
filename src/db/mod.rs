pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use std::sync::Mutex;

use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Invalid date in {field}: {value:?}")]
    InvalidDate { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// Single SQLite connection shared by request threads and structuring workers.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so every access goes
/// through the mutex for the duration of one closure.
pub struct ArchiveDb {
    conn: Mutex<Connection>,
}

impl ArchiveDb {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Open the on-disk database and run migrations.
    pub fn open(path: &std::path::Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?))
    }

    /// In-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(open_memory_database()?))
    }

    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&guard)
    }
}
