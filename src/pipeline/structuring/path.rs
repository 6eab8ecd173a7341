//! Canonical storage path derivation.
//!
//! Identified documents get a per-person folder tree:
//! `{Last}_{First}_{Id}/{Department}/{Type}/{original stem}.pdf`.
//! Unidentified documents are grouped flat by department:
//! `{Department}/{Type}_{Last}_{First}.pdf`.
//!
//! Primary keys always end in `.pdf` and sidecar keys in `.json`, so a
//! sidecar key never names a primary object and two primaries never share
//! a sidecar.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Classification;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_-]").expect("static regex is valid")
});

pub const DEFAULT_LAST_NAME: &str = "Unknown";
pub const DEFAULT_FIRST_NAME: &str = "User";
pub const DEFAULT_DEPARTMENT: &str = "General";
pub const DEFAULT_DOCUMENT_TYPE: &str = "Uncategorized";
pub const DEFAULT_EXTENSION: &str = "pdf";

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
///
/// Idempotent: `sanitize_segment(sanitize_segment(s)) == sanitize_segment(s)`.
pub fn sanitize_segment(input: &str) -> String {
    UNSAFE_CHARS.replace_all(input, "_").into_owned()
}

/// Object file name for a client filename: sanitized stem plus `.pdf`.
///
/// The client's extension is dropped (`"Rapport final.PDF"` →
/// `"Rapport_final.pdf"`, `"notes.json"` → `"notes.pdf"`).
pub fn stored_file_name(name: &str) -> String {
    let (stem, _) = split_extension(name);
    let stem = if stem.is_empty() { "document" } else { stem };
    format!("{}.{DEFAULT_EXTENSION}", sanitize_segment(stem))
}

/// Split `name` into stem and extension at the last `.`; a leading dot
/// (`.hidden`) or trailing dot does not count as an extension.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Derive the candidate path for a document from its classification.
///
/// Pure; absent or blank fields fall back to the documented defaults.
pub fn derive_path(original_name: &str, classification: &Classification) -> String {
    let last = field_or(&classification.last_name, DEFAULT_LAST_NAME);
    let first = field_or(&classification.first_name, DEFAULT_FIRST_NAME);
    let department = field_or(&classification.department, DEFAULT_DEPARTMENT);
    let doc_type = field_or(&classification.document_type, DEFAULT_DOCUMENT_TYPE);

    match classification.identifier() {
        Some(identifier) => format!(
            "{}_{}_{}/{}/{}/{}",
            sanitize_segment(last),
            sanitize_segment(first),
            sanitize_segment(identifier),
            sanitize_segment(department),
            sanitize_segment(doc_type),
            stored_file_name(original_name),
        ),
        None => format!(
            "{}/{}_{}_{}.{DEFAULT_EXTENSION}",
            sanitize_segment(department),
            sanitize_segment(doc_type),
            sanitize_segment(last),
            sanitize_segment(first),
        ),
    }
}

/// Key of the JSON sidecar that sits next to `primary_path`.
///
/// `a/b/report.pdf` → `a/b/report.json`.
pub fn sidecar_path(primary_path: &str) -> String {
    let (dir, file) = match primary_path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, primary_path),
    };
    let (stem, _) = split_extension(file);
    match dir {
        Some(dir) => format!("{dir}/{stem}.json"),
        None => format!("{stem}.json"),
    }
}

fn field_or<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
}
