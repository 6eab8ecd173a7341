//! Document classification: text extraction plus an LLM call that returns
//! identity, department and document-type fields.

pub mod ollama;
pub mod parser;
pub mod pdf;
pub mod prompt;
#[cfg(test)]
pub(crate) mod testing;

pub use ollama::*;
pub use parser::*;
pub use pdf::*;
pub use prompt::*;

use thiserror::Error;

use crate::models::Classification;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Document contains no extractable text")]
    NoText,

    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

/// Extract identity/department/type fields from raw document bytes.
///
/// Implementations may be slow (an LLM round-trip) and are always called
/// from a structuring worker, never from the upload path.
pub trait Classifier: Send + Sync {
    fn classify(&self, bytes: &[u8]) -> Result<Classification, ClassificationError>;
}

/// Plain text from a document body.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> Result<String, ClassificationError>;
}

/// Text completion against a local model.
pub trait LlmClient: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, system: &str)
        -> Result<String, ClassificationError>;
}

/// Text extraction followed by an LLM prompt.
pub struct LlmClassifier {
    extractor: Box<dyn TextExtractor>,
    llm: Box<dyn LlmClient>,
    model: String,
}

impl LlmClassifier {
    pub fn new(
        extractor: Box<dyn TextExtractor>,
        llm: Box<dyn LlmClient>,
        model: &str,
    ) -> Self {
        Self {
            extractor,
            llm,
            model: model.to_string(),
        }
    }
}

impl Classifier for LlmClassifier {
    fn classify(&self, bytes: &[u8]) -> Result<Classification, ClassificationError> {
        let text = self.extractor.extract_text(bytes)?;
        if text.trim().is_empty() {
            return Err(ClassificationError::NoText);
        }

        let prompt = build_classification_prompt(&text);
        tracing::debug!(
            model = %self.model,
            text_chars = text.chars().count(),
            "Sending document text to classifier"
        );
        let response = self
            .llm
            .generate(&self.model, &prompt, CLASSIFICATION_SYSTEM_PROMPT)?;
        parse_classification_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn extract_text(&self, _bytes: &[u8]) -> Result<String, ClassificationError> {
            Ok(self.0.to_string())
        }
    }

    struct RecordingLlm {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingLlm {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmClient for std::sync::Arc<RecordingLlm> {
        fn generate(
            &self,
            _model: &str,
            prompt: &str,
            _system: &str,
        ) -> Result<String, ClassificationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }
    }

    #[test]
    fn classifier_traits_are_object_safe() {
        fn _assert_classifier(_: &dyn Classifier) {}
        fn _assert_extractor(_: &dyn TextExtractor) {}
        fn _assert_llm(_: &dyn LlmClient) {}
    }

    #[test]
    fn classify_sends_text_and_parses_response() {
        let llm = std::sync::Arc::new(RecordingLlm::new(
            r#"{"firstName":"Jane","lastName":"Doe","cin":"AB123","department":"RH","documentType":"Attestation de travail","signatureDetected":true}"#,
        ));
        let classifier = LlmClassifier::new(
            Box::new(FixedText("Attestation pour Jane Doe, CIN AB123")),
            Box::new(llm.clone()),
            "llama3.1",
        );

        let c = classifier.classify(b"%PDF-1.4").unwrap();
        assert_eq!(c.first_name.as_deref(), Some("Jane"));
        assert_eq!(c.identifier.as_deref(), Some("AB123"));
        assert!(c.signature_detected);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("CIN AB123"));
    }

    #[test]
    fn empty_text_is_rejected_before_llm_call() {
        let llm = std::sync::Arc::new(RecordingLlm::new("{}"));
        let classifier =
            LlmClassifier::new(Box::new(FixedText("  \n ")), Box::new(llm.clone()), "m");

        assert!(matches!(
            classifier.classify(b"%PDF"),
            Err(ClassificationError::NoText)
        ));
        assert!(llm.prompts.lock().unwrap().is_empty());
    }
}
