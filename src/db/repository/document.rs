use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DOCUMENT_COLUMNS: &str = "id, original_name, mime_type, size, current_path, uploaded_by,
     upload_date, first_name, last_name, identifier, department, document_type,
     signature_detected, classified, status, status_error, last_modified";

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    let c = doc.classification.clone().unwrap_or_default();
    conn.execute(
        "INSERT INTO documents (id, original_name, mime_type, size, current_path, uploaded_by,
         upload_date, first_name, last_name, identifier, department, document_type,
         signature_detected, classified, status, status_error, last_modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            doc.id.to_string(),
            doc.original_name,
            doc.mime_type,
            doc.size as i64,
            doc.current_path,
            doc.uploaded_by,
            format_date(&doc.upload_date),
            c.first_name,
            c.last_name,
            c.identifier,
            c.department,
            c.document_type,
            c.signature_detected as i32,
            doc.classification.is_some() as i32,
            doc.status.as_str(),
            doc.status_error,
            format_date(&doc.last_modified),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], read_row)
        .optional()?;

    row.map(document_from_row).transpose()
}

/// Like [`get_document`], but a missing row is an error.
pub fn require_document(conn: &Connection, id: &Uuid) -> Result<Document, DatabaseError> {
    get_document(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Document".into(),
        id: id.to_string(),
    })
}

/// All documents, most recent upload first.
pub fn list_documents(conn: &Connection) -> Result<Vec<Document>, DatabaseError> {
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY upload_date DESC, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], read_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Get all documents with the given analysis status.
pub fn get_documents_by_status(
    conn: &Connection,
    status: AnalysisStatus,
) -> Result<Vec<Document>, DatabaseError> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE status = ?1 ORDER BY upload_date DESC, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![status.as_str()], read_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Commit a successful structuring attempt: path, classification and
/// `completed` status in a single statement.
pub fn commit_structured(
    conn: &Connection,
    id: &Uuid,
    current_path: &str,
    classification: &Classification,
    modified: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET current_path = ?2, first_name = ?3, last_name = ?4,
         identifier = ?5, department = ?6, document_type = ?7, signature_detected = ?8,
         classified = 1, status = 'completed', status_error = NULL, last_modified = ?9
         WHERE id = ?1",
        params![
            id.to_string(),
            current_path,
            classification.first_name,
            classification.last_name,
            classification.identifier,
            classification.department,
            classification.document_type,
            classification.signature_detected as i32,
            format_date(modified),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(
                msg.unwrap_or_else(|| format!("current_path {current_path} already in use")),
            )
        }
        other => DatabaseError::Sqlite(other),
    })?;
    ensure_updated(rows, id)
}

/// Update only the status columns. The path and classification are left as-is.
pub fn update_status(
    conn: &Connection,
    id: &Uuid,
    status: AnalysisStatus,
    status_error: Option<&str>,
    modified: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let error = match status {
        AnalysisStatus::Failed => status_error,
        _ => None,
    };
    let rows = conn.execute(
        "UPDATE documents SET status = ?2, status_error = ?3, last_modified = ?4 WHERE id = ?1",
        params![id.to_string(), status.as_str(), error, format_date(modified)],
    )?;
    ensure_updated(rows, id)
}

pub fn delete_document(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
    ensure_updated(rows, id)
}

/// Whether any record currently points at `path`.
pub fn path_in_use(conn: &Connection, path: &str) -> Result<bool, DatabaseError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM documents WHERE current_path = ?1 LIMIT 1",
            params![path],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn ensure_updated(rows: usize, id: &Uuid) -> Result<(), DatabaseError> {
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

fn format_date(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(field: &str, s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|_| DatabaseError::InvalidDate {
            field: field.into(),
            value: s.into(),
        })
}

// Internal row type for Document mapping
struct DocumentRow {
    id: String,
    original_name: String,
    mime_type: String,
    size: i64,
    current_path: String,
    uploaded_by: String,
    upload_date: String,
    first_name: Option<String>,
    last_name: Option<String>,
    identifier: Option<String>,
    department: Option<String>,
    document_type: Option<String>,
    signature_detected: i32,
    classified: i32,
    status: String,
    status_error: Option<String>,
    last_modified: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        original_name: row.get(1)?,
        mime_type: row.get(2)?,
        size: row.get(3)?,
        current_path: row.get(4)?,
        uploaded_by: row.get(5)?,
        upload_date: row.get(6)?,
        first_name: row.get(7)?,
        last_name: row.get(8)?,
        identifier: row.get(9)?,
        department: row.get(10)?,
        document_type: row.get(11)?,
        signature_detected: row.get(12)?,
        classified: row.get(13)?,
        status: row.get(14)?,
        status_error: row.get(15)?,
        last_modified: row.get(16)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    let classification = (row.classified != 0).then(|| Classification {
        first_name: row.first_name,
        last_name: row.last_name,
        identifier: row.identifier,
        department: row.department,
        document_type: row.document_type,
        signature_detected: row.signature_detected != 0,
    });

    Ok(Document {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        original_name: row.original_name,
        mime_type: row.mime_type,
        size: row.size.max(0) as u64,
        current_path: row.current_path,
        uploaded_by: row.uploaded_by,
        upload_date: parse_date("upload_date", &row.upload_date)?,
        classification,
        status: AnalysisStatus::from_str(&row.status)?,
        status_error: row.status_error,
        last_modified: parse_date("last_modified", &row.last_modified)?,
    })
}
