//! Object store boundary.
//!
//! Key-addressed blob storage with `/` as the hierarchy separator. The
//! structuring pipeline only talks to [`ObjectStore`]; [`FsObjectStore`] is the
//! on-disk backend and [`MemoryObjectStore`] the in-process one.

pub mod fs;
pub mod memory;
pub mod signing;
#[cfg(test)]
pub(crate) mod testing;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;
pub use signing::UrlSigner;

use std::time::Duration;

use thiserror::Error;

/// Errors emitted by object-store operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Object store lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub(crate) fn io(path: &str, err: impl std::fmt::Display) -> Self {
        StorageError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Key-addressed blob store.
///
/// No atomic rename is offered; relocation is copy-then-delete.
pub trait ObjectStore: Send + Sync {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete the object. Deleting a missing key succeeds.
    fn delete(&self, path: &str) -> Result<(), StorageError>;

    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Copy `src` to `dst`, overwriting `dst` if present.
    fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError>;

    fn signed_read_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError>;
}

/// Validate a store-relative key: non-empty, no leading or trailing `/`,
/// no empty, `.` or `..` segments.
pub fn validate_key(path: &str) -> Result<(), StorageError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.ends_with('/')
        || path.contains('\\')
        || path.contains('\0')
        || path
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(path.to_string()));
    }
    Ok(())
}
