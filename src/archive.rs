//! Public entry point: uploads, lookups, edits, re-analysis and deletion.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::config::{ArchiveConfig, ConfigError};
use crate::db::{self, ArchiveDb, DatabaseError};
use crate::models::{AnalysisStatus, ClassificationPatch, Document};
use crate::pipeline::classify::{
    ClassificationError, Classifier, LlmClassifier, OllamaClient, PdfTextExtractor,
};
use crate::pipeline::ingest::{IngestError, Ingestor, Upload};
use crate::pipeline::locks::{DocumentLocks, LockPoisoned};
use crate::pipeline::queue::{QueueError, StructuringQueue};
use crate::pipeline::removal::{remove_document, RemovalError};
use crate::pipeline::structuring::{
    refresh_sidecar, ClassificationUpdate, StructuringError, Structurer,
};
use crate::storage::{FsObjectStore, ObjectStore, StorageError, UrlSigner};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Document not found: {0}")]
    NotFound(Uuid),

    #[error("Document {0} is still awaiting analysis")]
    AnalysisPending(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Structuring error: {0}")]
    Structuring(StructuringError),

    #[error("Structuring queue unavailable: {0}")]
    Queue(#[from] QueueError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Classifier setup failed: {0}")]
    Classifier(#[from] ClassificationError),

    #[error(transparent)]
    Lock(#[from] LockPoisoned),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Errors the caller caused (bad upload, unknown id, premature edit).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::AnalysisPending(_)
        )
    }
}

impl From<IngestError> for ArchiveError {
    fn from(err: IngestError) -> Self {
        match err {
            e if e.is_validation() => Self::Validation(e.to_string()),
            IngestError::Storage(e) => Self::Storage(e),
            IngestError::Database(e) => Self::Database(e),
            e => Self::Validation(e.to_string()),
        }
    }
}

impl From<StructuringError> for ArchiveError {
    fn from(err: StructuringError) -> Self {
        match err {
            StructuringError::DocumentNotFound(id) => Self::NotFound(id),
            StructuringError::AnalysisPending(id) => Self::AnalysisPending(id),
            StructuringError::Database(e) => Self::Database(e),
            StructuringError::Lock(e) => Self::Lock(e),
            e => Self::Structuring(e),
        }
    }
}

impl From<RemovalError> for ArchiveError {
    fn from(err: RemovalError) -> Self {
        match err {
            RemovalError::NotFound(id) => Self::NotFound(id),
            RemovalError::Storage { source, .. } => Self::Storage(source),
            RemovalError::Database(e) => Self::Database(e),
            RemovalError::Lock(e) => Self::Lock(e),
        }
    }
}

/// The document archive: one record store, one object store, one
/// background structuring pool.
pub struct Archive {
    db: Arc<ArchiveDb>,
    store: Arc<dyn ObjectStore>,
    structurer: Arc<Structurer>,
    queue: Arc<StructuringQueue>,
    ingestor: Ingestor,
    signed_url_ttl: Duration,
}

impl Archive {
    pub fn new(
        db: Arc<ArchiveDb>,
        store: Arc<dyn ObjectStore>,
        classifier: Arc<dyn Classifier>,
        config: &ArchiveConfig,
    ) -> Self {
        let structurer = Arc::new(Structurer::new(
            db.clone(),
            store.clone(),
            classifier,
            Arc::new(DocumentLocks::new()),
            config.max_collision_attempts,
        ));

        let worker = Arc::clone(&structurer);
        let queue = Arc::new(StructuringQueue::start(
            config.worker_count,
            config.queue_capacity,
            move |id| match worker.run_classification(id) {
                Ok(doc) => {
                    tracing::debug!(doc_id = %id, status = %doc.status, "Structuring job finished")
                }
                Err(StructuringError::DocumentNotFound(_)) => {
                    tracing::info!(doc_id = %id, "Document deleted before structuring ran")
                }
                Err(e) => tracing::error!(doc_id = %id, error = %e, "Structuring job failed"),
            },
        ));

        let ingestor = Ingestor::new(
            db.clone(),
            store.clone(),
            queue.clone(),
            config.max_upload_bytes,
        );

        Self {
            db,
            store,
            structurer,
            queue,
            ingestor,
            signed_url_ttl: config.signed_url_ttl,
        }
    }

    /// On-disk archive under `config.data_dir`, classified through Ollama.
    pub fn open(config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        let llm = OllamaClient::new(&config.ollama_url, config.ollama_timeout_secs)?;
        let classifier = LlmClassifier::new(
            Box::new(PdfTextExtractor),
            Box::new(llm),
            &config.ollama_model,
        );
        Self::open_with_classifier(config, Arc::new(classifier))
    }

    pub fn open_with_classifier(
        config: &ArchiveConfig,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, ArchiveError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let db = Arc::new(ArchiveDb::open(&config.database_path())?);

        let signer = match &config.url_secret {
            Some(secret) => {
                UrlSigner::new(&config.public_base_url, &config.bucket, secret.as_bytes())
            }
            None => UrlSigner::with_random_secret(&config.public_base_url, &config.bucket),
        };
        let store = Arc::new(FsObjectStore::open(config.objects_dir(), signer)?);

        let archive = Self::new(db, store, classifier, config);
        let resumed = archive.requeue_pending()?;
        tracing::info!(
            data_dir = %config.data_dir.display(),
            bucket = %config.bucket,
            workers = config.worker_count,
            resumed,
            "Archive opened"
        );
        Ok(archive)
    }

    /// Schedule every `pending` document again, e.g. jobs lost when the
    /// previous process stopped. Returns how many were queued.
    pub fn requeue_pending(&self) -> Result<usize, ArchiveError> {
        let pending = self
            .db
            .with_conn(|conn| db::get_documents_by_status(conn, AnalysisStatus::Pending))?;

        let mut queued = 0;
        for doc in &pending {
            match self.queue.enqueue(doc.id) {
                Ok(()) => queued += 1,
                Err(e) => {
                    tracing::warn!(doc_id = %doc.id, error = %e, "Could not resume structuring");
                    break;
                }
            }
        }
        Ok(queued)
    }

    /// Accept an upload; classification runs in the background.
    pub fn upload(
        &self,
        bytes: &[u8],
        original_name: &str,
        mime_type: &str,
        uploaded_by: &str,
    ) -> Result<Document, ArchiveError> {
        Ok(self.ingestor.ingest(Upload {
            bytes,
            original_name,
            mime_type,
            uploaded_by,
        })?)
    }

    /// Every document, newest upload first.
    pub fn list(&self) -> Result<Vec<Document>, ArchiveError> {
        Ok(self.db.with_conn(db::list_documents)?)
    }

    pub fn get(&self, id: Uuid) -> Result<Document, ArchiveError> {
        self.db
            .with_conn(|conn| db::get_document(conn, &id))?
            .ok_or(ArchiveError::NotFound(id))
    }

    /// Time-limited read URL for the document's current object.
    pub fn file_url(&self, id: Uuid) -> Result<String, ArchiveError> {
        let doc = self.get(id)?;
        Ok(self
            .store
            .signed_read_url(&doc.current_path, self.signed_url_ttl)?)
    }

    /// Edit classification fields; relocates the document if its derived
    /// path changes. Waits for any in-flight attempt on the same document
    /// and is refused while the document is still `pending`.
    pub fn update_metadata(
        &self,
        id: Uuid,
        patch: ClassificationPatch,
    ) -> Result<Document, ArchiveError> {
        if patch.is_empty() {
            return Err(ArchiveError::Validation("No metadata fields to update".into()));
        }
        Ok(self
            .structurer
            .restructure(id, ClassificationUpdate::Merge(patch))?)
    }

    /// Send a document back through classification and structuring.
    pub fn reanalyze(&self, id: Uuid) -> Result<Document, ArchiveError> {
        let pending = {
            let _guard = self.structurer.lock(id)?;
            self.get(id)?;
            let now = chrono::Local::now().naive_local();
            let doc = self.db.with_conn(|conn| {
                db::update_status(conn, &id, AnalysisStatus::Pending, None, &now)?;
                db::require_document(conn, &id)
            })?;
            refresh_sidecar(&*self.store, &doc);
            doc
        };

        if let Err(e) = self.queue.enqueue(id) {
            tracing::warn!(doc_id = %id, error = %e, "Could not schedule re-analysis");
            let _guard = self.structurer.lock(id)?;
            let message = format!("scheduling: {e}");
            let now = chrono::Local::now().naive_local();
            let failed = self.db.with_conn(|conn| {
                db::update_status(conn, &id, AnalysisStatus::Failed, Some(&message), &now)?;
                db::require_document(conn, &id)
            })?;
            refresh_sidecar(&*self.store, &failed);
            return Err(e.into());
        }

        tracing::info!(doc_id = %id, "Re-analysis scheduled");
        Ok(pending)
    }

    /// Remove the document's object and sidecar, then its record.
    pub fn delete(&self, id: Uuid) -> Result<(), ArchiveError> {
        remove_document(&self.db, &*self.store, self.structurer.locks(), id)?;
        Ok(())
    }

    /// Block until no structuring work is queued or running.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.queue.wait_idle(timeout)
    }

    /// Stop intake and finish queued work.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}
