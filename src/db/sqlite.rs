use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection};

use super::DatabaseError;

/// One schema step, applied at most once and recorded in `schema_version`.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "documents",
    sql: include_str!("../../resources/migrations/001_documents.sql"),
}];

/// Open (or create) the record database at `path`, migrated to the latest schema.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    prepare(Connection::open(path)?)
}

/// Migrated in-memory database (tests, throwaway archives).
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> Result<Connection, DatabaseError> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Apply every migration newer than the recorded schema version, each in
/// its own transaction.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             applied_at TEXT NOT NULL DEFAULT (datetime('now'))
         );",
    )?;
    let current = schema_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let failed = |e: rusqlite::Error| DatabaseError::MigrationFailed {
            version: migration.version,
            reason: e.to_string(),
        };
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )
        .map_err(failed)?;
        tx.commit()?;
        tracing::info!(version = migration.version, name = migration.name, "Schema migrated");
    }
    Ok(())
}

/// Highest applied migration, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}
