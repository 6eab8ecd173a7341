//! Ordered document deletion.
//!
//! Storage is removed first and the record last. Any store failure aborts
//! before the record is touched, so a failed delete can be retried.

use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, ArchiveDb, DatabaseError};
use crate::models::Document;
use crate::pipeline::locks::{DocumentLocks, LockPoisoned};
use crate::pipeline::structuring::sidecar_path;
use crate::storage::{ObjectStore, StorageError};

#[derive(Error, Debug)]
pub enum RemovalError {
    #[error("Document not found: {0}")]
    NotFound(Uuid),

    #[error("Could not delete {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Lock(#[from] LockPoisoned),
}

/// Delete a document's primary object, its sidecar, then its record.
///
/// Waits for any in-flight structuring attempt on the same document and
/// operates on the path that attempt left behind.
pub fn remove_document(
    db: &ArchiveDb,
    store: &dyn ObjectStore,
    locks: &DocumentLocks,
    id: Uuid,
) -> Result<Document, RemovalError> {
    let _guard = locks.acquire(id)?;

    let doc = db
        .with_conn(|conn| db::get_document(conn, &id))?
        .ok_or(RemovalError::NotFound(id))?;

    for path in [doc.current_path.clone(), sidecar_path(&doc.current_path)] {
        store.delete(&path).map_err(|source| {
            tracing::warn!(doc_id = %id, path = %path, error = %source, "Delete aborted");
            RemovalError::Storage {
                path: path.clone(),
                source,
            }
        })?;
    }

    db.with_conn(|conn| db::delete_document(conn, &id))?;
    tracing::info!(doc_id = %id, path = %doc.current_path, "Document deleted");
    Ok(doc)
}
