pub const CLASSIFICATION_SYSTEM_PROMPT: &str = "You are a document analysis assistant. \
Extract structured information from administrative documents and return only valid JSON.";

/// Longest document excerpt sent to the model, in characters.
pub const MAX_PROMPT_TEXT_CHARS: usize = 12_000;

/// Build the classification prompt for one document's text.
pub fn build_classification_prompt(text: &str) -> String {
    let excerpt: String = text.chars().take(MAX_PROMPT_TEXT_CHARS).collect();

    format!(
        r#"Analyze the following document text and extract these fields as a JSON object:
- firstName (prénom): first name of the document owner
- lastName (nom): last name of the document owner
- cin: national identity card number (CIN), if present
- department (département): department responsible for the document (e.g. RH, Finance, IT)
- documentType (type de document): kind of document (e.g. Demande de congé, Attestation de travail, Fiche de paie)
- signatureDetected: true if a signature is mentioned or detected in the text

If a field is missing or unclear, set it to null. Return ONLY the JSON object.

<document>
{excerpt}
</document>"#
    )
}
