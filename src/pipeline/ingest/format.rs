use chrono::NaiveDateTime;
use uuid::Uuid;

use super::IngestError;
use crate::pipeline::structuring::stored_file_name;

pub const ACCEPTED_MIME_TYPE: &str = "application/pdf";
pub const PDF_MAGIC: &[u8] = b"%PDF";
pub const UPLOAD_PREFIX: &str = "uploads";

const MAX_FILENAME_CHARS: usize = 255;

/// Reject anything that is not a non-empty PDF within `max_bytes`.
pub fn validate_upload(bytes: &[u8], mime_type: &str, max_bytes: u64) -> Result<(), IngestError> {
    let declared = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if declared != ACCEPTED_MIME_TYPE {
        return Err(IngestError::UnsupportedType(mime_type.to_string()));
    }

    let size = bytes.len() as u64;
    if size > max_bytes {
        return Err(IngestError::FileTooLarge {
            size_mb: size as f64 / (1024.0 * 1024.0),
            max_mb: max_bytes as f64 / (1024.0 * 1024.0),
        });
    }
    if bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(IngestError::NotPdf);
    }
    Ok(())
}

/// Strip directory components and control characters from a client filename.
pub fn sanitize_filename(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let clean: String = name
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_CHARS)
        .collect();
    let clean = clean.trim();

    if clean.is_empty() || clean == "." || clean == ".." {
        "document.pdf".to_string()
    } else {
        clean.to_string()
    }
}

/// Key for a freshly uploaded object: no classification needed, unique per
/// document. `uploads/{unix millis}-{id}-{safe stem}.pdf`.
pub fn provisional_path(id: &Uuid, original_name: &str, uploaded_at: &NaiveDateTime) -> String {
    format!(
        "{UPLOAD_PREFIX}/{}-{}-{}",
        uploaded_at.and_utc().timestamp_millis(),
        id.simple(),
        stored_file_name(original_name)
    )
}
