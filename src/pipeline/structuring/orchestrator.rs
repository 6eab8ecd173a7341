use std::sync::Arc;

use uuid::Uuid;

use super::collision::resolve_collision;
use super::path::derive_path;
use super::relocation::relocate;
use super::sidecar::refresh_sidecar;
use super::StructuringError;
use crate::db::{self, ArchiveDb};
use crate::models::{
    AnalysisStatus, Classification, ClassificationPatch, Document, StructuringPhase,
};
use crate::pipeline::classify::Classifier;
use crate::pipeline::locks::{DocumentGuard, DocumentLocks, PathReservations};
use crate::storage::ObjectStore;

/// How a structuring attempt changes the stored classification.
#[derive(Debug, Clone)]
pub enum ClassificationUpdate {
    /// Fresh classifier output replaces whatever was there.
    Replace(Classification),
    /// A user edit; fields the patch leaves out keep their value.
    Merge(ClassificationPatch),
}

/// Drives every change to a document's current path.
///
/// Each public entry point takes the document's lock for the whole attempt,
/// so an upload-triggered classification and a user edit for the same id
/// never interleave. All of them funnel into [`Structurer::restructure_locked`].
pub struct Structurer {
    db: Arc<ArchiveDb>,
    store: Arc<dyn ObjectStore>,
    classifier: Arc<dyn Classifier>,
    locks: Arc<DocumentLocks>,
    reservations: PathReservations,
    max_collision_attempts: u32,
}

impl Structurer {
    pub fn new(
        db: Arc<ArchiveDb>,
        store: Arc<dyn ObjectStore>,
        classifier: Arc<dyn Classifier>,
        locks: Arc<DocumentLocks>,
        max_collision_attempts: u32,
    ) -> Self {
        Self {
            db,
            store,
            classifier,
            locks,
            reservations: PathReservations::new(),
            max_collision_attempts,
        }
    }

    pub fn locks(&self) -> &DocumentLocks {
        &self.locks
    }

    /// Background unit of work: classify the stored object, then structure.
    ///
    /// Attempt failures are recorded on the document and returned as
    /// `Ok(doc)` with `status == Failed`; `Err` means the record itself could
    /// not be read or written.
    pub fn run_classification(&self, id: Uuid) -> Result<Document, StructuringError> {
        let _guard = self.locks.acquire(id)?;
        let span = tracing::info_span!("restructure", doc_id = %id, trigger = "classification");
        let _enter = span.enter();

        let doc = self.load(id)?;
        let classified = self
            .store
            .get(&doc.current_path)
            .map_err(StructuringError::from)
            .and_then(|bytes| Ok(self.classifier.classify(&bytes)?));

        match classified {
            Ok(classification) => {
                self.restructure_locked(doc, ClassificationUpdate::Replace(classification))
            }
            Err(e) => self.record_failure(doc, StructuringPhase::Classifying, &e),
        }
    }

    /// Apply a classification update to a document, relocating if its
    /// derived path changes.
    ///
    /// Refused with [`StructuringError::AnalysisPending`] while the document
    /// is `pending`: its queued classification would replace the edit.
    pub fn restructure(
        &self,
        id: Uuid,
        update: ClassificationUpdate,
    ) -> Result<Document, StructuringError> {
        let _guard = self.locks.acquire(id)?;
        let span = tracing::info_span!("restructure", doc_id = %id, trigger = "edit");
        let _enter = span.enter();

        let doc = self.load(id)?;
        if doc.status == AnalysisStatus::Pending {
            tracing::debug!("Edit refused; classification still queued");
            return Err(StructuringError::AnalysisPending(id));
        }
        self.restructure_locked(doc, update)
    }

    /// Hold the document lock for an operation outside the structurer
    /// (deletion, status resets).
    pub fn lock(&self, id: Uuid) -> Result<DocumentGuard<'_>, StructuringError> {
        Ok(self.locks.acquire(id)?)
    }

    /// Single structuring path; caller holds the document lock.
    fn restructure_locked(
        &self,
        doc: Document,
        update: ClassificationUpdate,
    ) -> Result<Document, StructuringError> {
        let classification = match update {
            ClassificationUpdate::Replace(c) => c,
            ClassificationUpdate::Merge(patch) => doc
                .classification
                .clone()
                .unwrap_or_default()
                .merged_with(&patch),
        };

        match self.structure(&doc, classification) {
            Ok(done) => Ok(done),
            Err(e) => self.record_failure(doc, StructuringPhase::Structuring, &e),
        }
    }

    fn structure(
        &self,
        doc: &Document,
        classification: Classification,
    ) -> Result<Document, StructuringError> {
        let candidate = derive_path(&doc.original_name, &classification);

        let mut reservation = None;
        let final_path = resolve_collision(
            &candidate,
            &doc.current_path,
            self.max_collision_attempts,
            |path| {
                let Some(claim) = self.reservations.try_reserve(path)? else {
                    return Ok(true);
                };
                if self.db.with_conn(|conn| db::path_in_use(conn, path))?
                    || self.store.exists(path)?
                {
                    return Ok(true);
                }
                reservation = Some(claim);
                Ok(false)
            },
        )?;

        if final_path == doc.current_path
            && doc.status == AnalysisStatus::Completed
            && doc.classification.as_ref() == Some(&classification)
        {
            tracing::debug!(path = %final_path, "Already structured; nothing to do");
            return Ok(doc.clone());
        }

        let modified = chrono::Local::now().naive_local();
        let relocation = relocate(&*self.store, &doc.current_path, &final_path, || {
            Ok(self.db.with_conn(|conn| {
                db::commit_structured(conn, &doc.id, &final_path, &classification, &modified)?;
                db::require_document(conn, &doc.id)
            })?)
        })?;
        drop(reservation);

        if !relocation.moved {
            refresh_sidecar(&*self.store, &relocation.document);
        }

        tracing::info!(
            path = %relocation.document.current_path,
            moved = relocation.moved,
            leaked = relocation.leaked.len(),
            "Document structured"
        );
        Ok(relocation.document)
    }

    /// Persist `failed` with the error; path and classification are untouched.
    fn record_failure(
        &self,
        doc: Document,
        phase: StructuringPhase,
        error: &StructuringError,
    ) -> Result<Document, StructuringError> {
        let message = format!("{phase}: {error}");
        tracing::warn!(
            doc_id = %doc.id,
            phase = %phase,
            path = %doc.current_path,
            error = %error,
            "Structuring attempt failed"
        );

        let modified = chrono::Local::now().naive_local();
        let failed = self.db.with_conn(|conn| {
            db::update_status(conn, &doc.id, AnalysisStatus::Failed, Some(&message), &modified)?;
            db::require_document(conn, &doc.id)
        })?;
        refresh_sidecar(&*self.store, &failed);
        Ok(failed)
    }

    fn load(&self, id: Uuid) -> Result<Document, StructuringError> {
        self.db
            .with_conn(|conn| db::get_document(conn, &id))?
            .ok_or(StructuringError::DocumentNotFound(id))
    }
}
