pub mod format;
pub mod importer;

pub use format::*;
pub use importer::*;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file type: {0} (only application/pdf is accepted)")]
    UnsupportedType(String),

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb:.1}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: f64 },

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("File content is not a PDF")]
    NotPdf,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl IngestError {
    /// Rejections caused by the upload itself; nothing was written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType(_) | Self::FileTooLarge { .. } | Self::EmptyFile | Self::NotPdf
        )
    }
}
