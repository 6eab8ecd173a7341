//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`; callers own locking and
//! transaction scope.

mod document;

pub use document::*;
