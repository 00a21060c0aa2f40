//! Error types for estratto.

use thiserror::Error;

/// Result type for estratto operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A single field-level problem found while validating raw input.
///
/// `kind` is a stable machine-readable tag (`missing`, `type_error`,
/// `empty_text`, `text_too_long`, `html_detected`, `lingua_missing`);
/// `message` is for humans.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldIssue {
    /// Dotted path of the offending field (e.g. `testo_normalizzato`).
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
    /// Stable machine-readable tag for the problem class.
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldIssue {
    /// Create a new field issue.
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Error type for estratto operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input validation rejected the raw payload (hard error).
    #[error("input validation failed: {}", format_issues(.0))]
    InvalidInput(Vec<FieldIssue>),

    /// NER model loading failed.
    #[error("model initialization failed: {0}")]
    ModelInit(String),

    /// NER model inference failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// NER invocation exceeded its deadline.
    #[error("inference timed out after {0:.3}s")]
    Timeout(f64),

    /// Configuration file or value could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a model initialization error.
    pub fn model_init(msg: impl Into<String>) -> Self {
        Error::ModelInit(msg.into())
    }

    /// Create an inference error.
    pub fn inference(msg: impl Into<String>) -> Self {
        Error::Inference(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Short stable tag for the error class, used in skip reasons and
    /// metric labels (low cardinality).
    pub fn class(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::ModelInit(_) => "model_init",
            Error::Inference(_) => "inference",
            Error::Timeout(_) => "timeout",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_message_joins_issues() {
        let err = Error::InvalidInput(vec![
            FieldIssue::new("id_messaggio", "field is required", "missing"),
            FieldIssue::new("testo_normalizzato", "must not be empty", "empty_text"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("id_messaggio: field is required"));
        assert!(msg.contains("testo_normalizzato: must not be empty"));
    }

    #[test]
    fn field_issue_serializes_kind_as_type() {
        let issue = FieldIssue::new("lingua", "lingua is null", "lingua_missing");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "lingua_missing");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn error_class_is_stable() {
        assert_eq!(Error::Timeout(2.0).class(), "timeout");
        assert_eq!(Error::model_init("x").class(), "model_init");
    }
}
