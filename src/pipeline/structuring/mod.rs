//! Structuring: derive a canonical path from a classification, resolve
//! collisions, relocate the object and its sidecar, commit the record.

pub mod collision;
pub mod orchestrator;
pub mod path;
pub mod relocation;
pub mod sidecar;

pub use collision::*;
pub use orchestrator::*;
pub use path::*;
pub use relocation::*;
pub use sidecar::*;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::pipeline::classify::ClassificationError;
use crate::pipeline::locks::LockPoisoned;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Relocation from {from} to {to} failed: {source}")]
    Relocation {
        from: String,
        to: String,
        #[source]
        source: StorageError,
    },

    #[error("Copy to {0} could not be verified")]
    CopyNotVerified(String),

    #[error("No free path for {candidate} after {attempts} attempts")]
    CollisionLimit { candidate: String, attempts: u32 },

    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("Document {0} is awaiting analysis; edit it once analysis has finished")]
    AnalysisPending(Uuid),

    #[error("Sidecar serialization failed: {0}")]
    Sidecar(#[from] serde_json::Error),

    #[error(transparent)]
    Lock(#[from] LockPoisoned),
}
