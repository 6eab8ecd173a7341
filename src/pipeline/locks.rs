//! Single-writer discipline for document paths.
//!
//! [`DocumentLocks`] serializes every mutation of one document's current
//! path (structuring attempts, edits, deletion). [`PathReservations`] keeps
//! two different documents from settling on the same free candidate path
//! between the collision check and the record commit.

use std::collections::HashSet;
use std::sync::{Condvar, LockResult, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Lock table poisoned")]
pub struct LockPoisoned;

impl<T> From<PoisonError<T>> for LockPoisoned {
    fn from(_: PoisonError<T>) -> Self {
        LockPoisoned
    }
}

/// Per-document mutual exclusion keyed by document id.
#[derive(Default)]
pub struct DocumentLocks {
    held: Mutex<HashSet<Uuid>>,
    released: Condvar,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no one else holds `id`, then hold it until the guard drops.
    pub fn acquire(&self, id: Uuid) -> Result<DocumentGuard<'_>, LockPoisoned> {
        let mut held = self.held.lock()?;
        while held.contains(&id) {
            held = self.released.wait(held)?;
        }
        held.insert(id);
        Ok(DocumentGuard { locks: self, id })
    }

    pub fn is_held(&self, id: &Uuid) -> bool {
        self.held.lock().map(|h| h.contains(id)).unwrap_or(false)
    }

    fn release(&self, id: &Uuid) {
        let mut held = recover(self.held.lock());
        held.remove(id);
        drop(held);
        self.released.notify_all();
    }
}

pub struct DocumentGuard<'a> {
    locks: &'a DocumentLocks,
    id: Uuid,
}

impl DocumentGuard<'_> {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.id);
    }
}

/// Candidate paths claimed by in-flight structuring attempts.
#[derive(Default)]
pub struct PathReservations {
    reserved: Mutex<HashSet<String>>,
}

impl PathReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path`; `None` if another attempt already holds it.
    pub fn try_reserve(&self, path: &str) -> Result<Option<PathReservation<'_>>, LockPoisoned> {
        let mut reserved = self.reserved.lock()?;
        if !reserved.insert(path.to_string()) {
            return Ok(None);
        }
        Ok(Some(PathReservation {
            owner: self,
            path: path.to_string(),
        }))
    }

    pub fn is_reserved(&self, path: &str) -> bool {
        self.reserved
            .lock()
            .map(|r| r.contains(path))
            .unwrap_or(false)
    }
}

pub struct PathReservation<'a> {
    owner: &'a PathReservations,
    path: String,
}

impl PathReservation<'_> {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for PathReservation<'_> {
    fn drop(&mut self) {
        recover(self.owner.reserved.lock()).remove(&self.path);
    }
}

// Release paths must not panic while unwinding.
fn recover<'a, T>(result: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}
