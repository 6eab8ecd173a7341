//! Store wrappers for tests: operation counting and fault injection.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{MemoryObjectStore, ObjectStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Put,
    Get,
    Delete,
    Exists,
    Copy,
}

/// Wraps a [`MemoryObjectStore`], counting every call and failing the
/// configured (operation, key) pairs. Hidden keys report `exists == false`
/// even when stored.
pub struct FaultyStore {
    pub inner: Arc<MemoryObjectStore>,
    calls: AtomicUsize,
    failures: Mutex<HashSet<(Op, String)>>,
    hidden: Mutex<HashSet<String>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryObjectStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            failures: Mutex::new(HashSet::new()),
            hidden: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail(&self, op: Op, key: &str) {
        self.failures.lock().unwrap().insert((op, key.to_string()));
    }

    pub fn hide(&self, key: &str) {
        self.hidden.lock().unwrap().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
        self.hidden.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    fn check(&self, op: Op, key: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.lock().unwrap().contains(&(op, key.to_string())) {
            return Err(StorageError::io(key, format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

impl ObjectStore for FaultyStore {
    fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.check(Op::Put, path)?;
        self.inner.put(path, bytes, content_type)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.check(Op::Get, path)?;
        self.inner.get(path)
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.check(Op::Delete, path)?;
        self.inner.delete(path)
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        self.check(Op::Exists, path)?;
        if self.hidden.lock().unwrap().contains(path) {
            return Ok(false);
        }
        self.inner.exists(path)
    }

    fn copy(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        self.check(Op::Copy, dst)?;
        self.inner.copy(src, dst)
    }

    fn signed_read_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        self.inner.signed_read_url(path, ttl)
    }
}
