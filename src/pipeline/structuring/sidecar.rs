//! JSON sidecar mirroring a document's classification next to its object.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::path::sidecar_path;
use super::StructuringError;
use crate::models::{AnalysisStatus, Document};
use crate::storage::ObjectStore;

pub const SIDECAR_STRUCTURE_VERSION: &str = "1.0";
pub const SIDECAR_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sidecar {
    pub id: Uuid,
    pub original_name: String,
    pub upload_date: NaiveDateTime,
    pub uploaded_by: String,
    pub extracted_data: Option<ExtractedData>,
    pub signature_detected: bool,
    pub analysis_status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
    pub structure_version: String,
    pub last_modified: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub identifier_number: Option<String>,
    pub department: Option<String>,
    pub document_type: Option<String>,
}

impl Sidecar {
    /// Regenerate from the record; never copied between paths.
    pub fn from_document(doc: &Document) -> Self {
        let extracted_data = doc.classification.as_ref().map(|c| ExtractedData {
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            identifier_number: c.identifier.clone(),
            department: c.department.clone(),
            document_type: c.document_type.clone(),
        });

        Self {
            id: doc.id,
            original_name: doc.original_name.clone(),
            upload_date: doc.upload_date,
            uploaded_by: doc.uploaded_by.clone(),
            extracted_data,
            signature_detected: doc
                .classification
                .as_ref()
                .is_some_and(|c| c.signature_detected),
            analysis_status: doc.status,
            analysis_error: doc.status_error.clone(),
            structure_version: SIDECAR_STRUCTURE_VERSION.to_string(),
            last_modified: doc.last_modified,
        }
    }
}

/// Write the sidecar for `doc` next to its current path. Returns the key written.
pub fn write_sidecar(store: &dyn ObjectStore, doc: &Document) -> Result<String, StructuringError> {
    let key = sidecar_path(&doc.current_path);
    let body = serde_json::to_vec_pretty(&Sidecar::from_document(doc))?;
    store.put(&key, &body, SIDECAR_CONTENT_TYPE)?;
    Ok(key)
}

/// Best-effort variant for paths where the sidecar is not worth failing over.
pub fn refresh_sidecar(store: &dyn ObjectStore, doc: &Document) {
    if let Err(e) = write_sidecar(store, doc) {
        tracing::warn!(
            doc_id = %doc.id,
            path = %doc.current_path,
            error = %e,
            "Sidecar write failed"
        );
    }
}
