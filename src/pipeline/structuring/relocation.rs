//! Copy-then-delete relocation of a document's primary object and sidecar.
//!
//! Ordering:
//! 1. copy `old` → `new`, then verify `new` exists
//! 2. commit the record (caller-supplied); on failure the new copy is removed
//! 3. delete `old` and its sidecar; failures here are logged leaks
//! 4. write a sidecar regenerated from the committed record
//!
//! Until step 2 succeeds the old path stays authoritative.

use super::path::sidecar_path;
use super::sidecar::refresh_sidecar;
use super::StructuringError;
use crate::models::Document;
use crate::storage::ObjectStore;

/// What a relocation did beyond the record commit.
#[derive(Debug)]
pub struct Relocation {
    /// The record as committed.
    pub document: Document,
    /// False when `old == new` and no store call was made.
    pub moved: bool,
    /// Stale keys whose deletion failed and that now need out-of-band cleanup.
    pub leaked: Vec<String>,
}

pub fn relocate<F>(
    store: &dyn ObjectStore,
    old_path: &str,
    new_path: &str,
    commit: F,
) -> Result<Relocation, StructuringError>
where
    F: FnOnce() -> Result<Document, StructuringError>,
{
    if old_path == new_path {
        return Ok(Relocation {
            document: commit()?,
            moved: false,
            leaked: Vec::new(),
        });
    }

    store
        .copy(old_path, new_path)
        .map_err(|source| StructuringError::Relocation {
            from: old_path.to_string(),
            to: new_path.to_string(),
            source,
        })?;

    match store.exists(new_path) {
        Ok(true) => {}
        Ok(false) => {
            discard_copy(store, new_path);
            return Err(StructuringError::CopyNotVerified(new_path.to_string()));
        }
        Err(source) => {
            discard_copy(store, new_path);
            return Err(StructuringError::Relocation {
                from: old_path.to_string(),
                to: new_path.to_string(),
                source,
            });
        }
    }

    let document = match commit() {
        Ok(doc) => doc,
        Err(e) => {
            discard_copy(store, new_path);
            return Err(e);
        }
    };

    let mut leaked = Vec::new();
    for stale in [old_path.to_string(), sidecar_path(old_path)] {
        if let Err(e) = store.delete(&stale) {
            tracing::warn!(
                doc_id = %document.id,
                stale_path = %stale,
                new_path = %new_path,
                error = %e,
                "Cleanup leak: stale object left behind after relocation"
            );
            leaked.push(stale);
        }
    }

    refresh_sidecar(store, &document);

    tracing::info!(
        doc_id = %document.id,
        from = %old_path,
        to = %new_path,
        "Document relocated"
    );

    Ok(Relocation {
        document,
        moved: true,
        leaked,
    })
}

fn discard_copy(store: &dyn ObjectStore, path: &str) {
    if let Err(e) = store.delete(path) {
        tracing::warn!(path = %path, error = %e, "Could not remove uncommitted copy");
    }
}
