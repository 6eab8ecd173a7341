use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AnalysisStatus;

/// One archived file and the pointer to its authoritative object-store key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    /// Object-store key of the single authoritative copy.
    pub current_path: String,
    pub uploaded_by: String,
    pub upload_date: NaiveDateTime,
    pub classification: Option<Classification>,
    pub status: AnalysisStatus,
    /// Only set while `status == Failed`.
    pub status_error: Option<String>,
    pub last_modified: NaiveDateTime,
}

/// Identity/department/type metadata extracted from a document.
///
/// Every text field may be absent; the path deriver substitutes defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(rename = "identifierNumber")]
    pub identifier: Option<String>,
    pub department: Option<String>,
    pub document_type: Option<String>,
    #[serde(default)]
    pub signature_detected: bool,
}

/// A user edit to classification fields.
///
/// `None` leaves the field untouched; `Some("")` (or whitespace) clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(alias = "cin", alias = "identifierNumber")]
    pub identifier: Option<String>,
    pub department: Option<String>,
    pub document_type: Option<String>,
}

impl ClassificationPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.identifier.is_none()
            && self.department.is_none()
            && self.document_type.is_none()
    }
}

impl Classification {
    /// Field-wise merge: fields not mentioned by the patch keep their value.
    pub fn merged_with(&self, patch: &ClassificationPatch) -> Classification {
        fn apply(current: &Option<String>, edit: &Option<String>) -> Option<String> {
            match edit {
                None => current.clone(),
                Some(v) if v.trim().is_empty() => None,
                Some(v) => Some(v.trim().to_string()),
            }
        }

        Classification {
            first_name: apply(&self.first_name, &patch.first_name),
            last_name: apply(&self.last_name, &patch.last_name),
            identifier: apply(&self.identifier, &patch.identifier),
            department: apply(&self.department, &patch.department),
            document_type: apply(&self.document_type, &patch.document_type),
            signature_detected: self.signature_detected,
        }
    }

    /// The identifier, if present and non-blank.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
