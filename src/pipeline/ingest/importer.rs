use std::sync::Arc;

use uuid::Uuid;

use super::format::{provisional_path, sanitize_filename, validate_upload, ACCEPTED_MIME_TYPE};
use super::IngestError;
use crate::db::{self, ArchiveDb};
use crate::models::{AnalysisStatus, Document};
use crate::pipeline::queue::StructuringQueue;
use crate::pipeline::structuring::refresh_sidecar;
use crate::storage::ObjectStore;

/// One upload as received from a client.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub bytes: &'a [u8],
    pub original_name: &'a str,
    pub mime_type: &'a str,
    pub uploaded_by: &'a str,
}

/// Accepts uploads: provisional write, pending record, background job.
pub struct Ingestor {
    db: Arc<ArchiveDb>,
    store: Arc<dyn ObjectStore>,
    queue: Arc<StructuringQueue>,
    max_upload_bytes: u64,
}

impl Ingestor {
    pub fn new(
        db: Arc<ArchiveDb>,
        store: Arc<dyn ObjectStore>,
        queue: Arc<StructuringQueue>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            db,
            store,
            queue,
            max_upload_bytes,
        }
    }

    /// Store the upload and schedule classification; returns the pending
    /// record without waiting for the classifier.
    ///
    /// Validation failures leave no trace. A full queue still accepts the
    /// upload but records it as `failed` so it can be re-analyzed later.
    pub fn ingest(&self, upload: Upload<'_>) -> Result<Document, IngestError> {
        validate_upload(upload.bytes, upload.mime_type, self.max_upload_bytes)?;

        let id = Uuid::new_v4();
        let original_name = sanitize_filename(upload.original_name);
        let now = chrono::Local::now().naive_local();
        let path = provisional_path(&id, &original_name, &now);

        self.store.put(&path, upload.bytes, ACCEPTED_MIME_TYPE)?;

        let doc = Document {
            id,
            original_name,
            mime_type: ACCEPTED_MIME_TYPE.to_string(),
            size: upload.bytes.len() as u64,
            current_path: path,
            uploaded_by: upload.uploaded_by.to_string(),
            upload_date: now,
            classification: None,
            status: AnalysisStatus::Pending,
            status_error: None,
            last_modified: now,
        };

        if let Err(e) = self.db.with_conn(|conn| db::insert_document(conn, &doc)) {
            if let Err(cleanup) = self.store.delete(&doc.current_path) {
                tracing::warn!(path = %doc.current_path, error = %cleanup, "Could not remove orphaned upload");
            }
            return Err(e.into());
        }
        refresh_sidecar(&*self.store, &doc);

        tracing::info!(
            doc_id = %doc.id,
            file = %doc.original_name,
            size = doc.size,
            path = %doc.current_path,
            "Document uploaded"
        );

        match self.queue.enqueue(doc.id) {
            Ok(()) => Ok(doc),
            Err(e) => {
                tracing::warn!(doc_id = %doc.id, error = %e, "Could not schedule structuring");
                let message = format!("scheduling: {e}");
                let failed = self.db.with_conn(|conn| {
                    db::update_status(conn, &doc.id, AnalysisStatus::Failed, Some(&message), &now)?;
                    db::require_document(conn, &doc.id)
                })?;
                refresh_sidecar(&*self.store, &failed);
                Ok(failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::sidecar_path;
    use crate::storage::MemoryObjectStore;
    use std::sync::Mutex;
    use std::time::Duration;

    fn upload<'a>(bytes: &'a [u8], mime: &'a str) -> Upload<'a> {
        Upload {
            bytes,
            original_name: "report.pdf",
            mime_type: mime,
            uploaded_by: "user-1",
        }
    }

    struct Setup {
        db: Arc<ArchiveDb>,
        store: Arc<MemoryObjectStore>,
        jobs: Arc<Mutex<Vec<Uuid>>>,
        ingestor: Ingestor,
    }

    fn setup(capacity: usize) -> Setup {
        let db = Arc::new(ArchiveDb::open_in_memory().unwrap());
        let store = Arc::new(MemoryObjectStore::new());
        let jobs = Arc::new(Mutex::new(Vec::new()));
        let queue = {
            let jobs = Arc::clone(&jobs);
            Arc::new(StructuringQueue::start(1, capacity, move |id| {
                jobs.lock().unwrap().push(id);
            }))
        };
        let ingestor = Ingestor::new(db.clone(), store.clone(), queue, 1024);
        Setup {
            db,
            store,
            jobs,
            ingestor,
        }
    }

    #[test]
    fn upload_is_stored_pending_and_scheduled() {
        let s = setup(8);
        let doc = s.ingestor.ingest(upload(b"%PDF-1.4 body", "application/pdf")).unwrap();

        assert_eq!(doc.status, AnalysisStatus::Pending);
        assert_eq!(doc.size, 13);
        assert_eq!(doc.uploaded_by, "user-1");
        assert!(doc.current_path.starts_with("uploads/"));
        assert!(doc.current_path.ends_with("-report.pdf"));
        assert_eq!(s.store.get(&doc.current_path).unwrap(), b"%PDF-1.4 body");
        assert!(s.store.exists(&sidecar_path(&doc.current_path)).unwrap());

        let stored = s.db.with_conn(|c| db::require_document(c, &doc.id)).unwrap();
        assert_eq!(stored, doc);

        s.ingestor.queue.wait_idle(Duration::from_secs(5));
        assert_eq!(*s.jobs.lock().unwrap(), vec![doc.id]);
    }

    #[test]
    fn rejected_upload_has_no_side_effects() {
        let s = setup(8);
        assert!(s.ingestor.ingest(upload(b"%PDF", "text/plain")).is_err());
        assert!(s.ingestor.ingest(upload(&[b'%'; 2048], "application/pdf")).is_err());
        assert!(s.ingestor.ingest(upload(b"hello", "application/pdf")).is_err());

        assert!(s.store.keys().is_empty());
        assert!(s.db.with_conn(|c| db::list_documents(c)).unwrap().is_empty());
        assert!(s.jobs.lock().unwrap().is_empty());
    }

    #[test]
    fn client_filename_is_sanitized() {
        let s = setup(8);
        let doc = s
            .ingestor
            .ingest(Upload {
                original_name: "../../secret/Fiche de paie.pdf",
                ..upload(b"%PDF-1.4", "application/pdf")
            })
            .unwrap();
        assert_eq!(doc.original_name, "Fiche de paie.pdf");
        assert!(doc.current_path.ends_with("-Fiche_de_paie.pdf"));
    }

    #[test]
    fn closed_queue_marks_upload_failed() {
        let s = setup(8);
        s.ingestor.queue.shutdown();

        let doc = s.ingestor.ingest(upload(b"%PDF-1.4", "application/pdf")).unwrap();
        assert_eq!(doc.status, AnalysisStatus::Failed);
        assert!(doc.status_error.unwrap().starts_with("scheduling: "));
        assert!(s.store.exists(&doc.current_path).unwrap());
    }
}
