use serde::Deserialize;
use serde_json::Value;

use super::ClassificationError;
use crate::models::Classification;

/// Parse the model's reply into a [`Classification`].
///
/// Accepts a bare JSON object or one wrapped in a ```json fence. Null, blank
/// and non-string values become absent fields; the identifier may be keyed
/// `cin`, `identifier` or `identifierNumber`.
pub fn parse_classification_response(response: &str) -> Result<Classification, ClassificationError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawClassification {
        first_name: Option<Value>,
        last_name: Option<Value>,
        #[serde(alias = "identifier", alias = "identifierNumber")]
        cin: Option<Value>,
        department: Option<Value>,
        document_type: Option<Value>,
        signature_detected: Option<Value>,
    }

    let json = extract_json_object(response)?;
    let raw: RawClassification = serde_json::from_str(json)
        .map_err(|e| ClassificationError::MalformedResponse(e.to_string()))?;

    Ok(Classification {
        first_name: text_field(raw.first_name),
        last_name: text_field(raw.last_name),
        identifier: text_field(raw.cin),
        department: text_field(raw.department),
        document_type: text_field(raw.document_type),
        signature_detected: bool_field(raw.signature_detected),
    })
}

/// Slice out the outermost `{...}` object, skipping code fences and chatter.
fn extract_json_object(response: &str) -> Result<&str, ClassificationError> {
    let start = response
        .find('{')
        .ok_or_else(|| ClassificationError::MalformedResponse("No JSON object found".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| ClassificationError::MalformedResponse("Unclosed JSON object".into()))?;
    Ok(&response[start..=end])
}

fn text_field(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn bool_field(value: Option<Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "oui"),
        _ => false,
    }
}
