//! Input validation for the extraction pipeline.
//!
//! The upstream layer hands over a raw JSON map; [`validate_input`] turns
//! it into a typed [`ExtractionInput`] or a hard
//! [`Error::InvalidInput`](crate::Error::InvalidInput) carrying one
//! [`FieldIssue`] per problem. Validation errors are values, never panics,
//! so the orchestrator can always emit a well-formed failure envelope.
//!
//! A null `lingua` is a soft warning (`lingua_missing`), not a rejection:
//! the pipeline proceeds and the NER engine is gated off.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::{Error, FieldIssue, Result};

/// Raw HTML must be stripped upstream; a tag match rejects the input.
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[a-zA-Z/][^>]*>").expect("valid regex"));

/// Validated input for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionInput {
    /// Unique conversation identifier.
    pub id_conversazione: String,
    /// Unique message identifier.
    pub id_messaggio: String,
    /// Clean email body text (no raw HTML).
    pub testo_normalizzato: String,
    /// ISO language code, or `None` when upstream detection failed.
    pub lingua: Option<String>,
    /// ISO-8601 message timestamp.
    pub timestamp: String,
    /// Sender address or identifier.
    pub mittente: String,
    /// Recipient address or identifier.
    pub destinatario: String,
    /// Pre-annotations from the upstream layer, passed through opaquely.
    pub pre_annotazioni: Option<Value>,
    /// Routing rules already applied upstream, passed through opaquely.
    pub regole_routing: Option<Value>,
    /// Arbitrary tags attached by upstream layers, passed through opaquely.
    pub tag_upstream: Option<Value>,
}

impl ExtractionInput {
    /// Build a minimal input around a bare text, for the legacy
    /// document-level entry point.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            id_conversazione: "adhoc".to_string(),
            id_messaggio: "adhoc".to_string(),
            testo_normalizzato: text.into(),
            lingua: None,
            timestamp: String::new(),
            mittente: String::new(),
            destinatario: String::new(),
            pre_annotazioni: None,
            regole_routing: None,
            tag_upstream: None,
        }
    }
}

/// Validate a raw JSON map against the input contract.
///
/// Checks run in order: required-field presence, type coherence, text not
/// whitespace-only, text length within bounds, no HTML tag pattern. All
/// field problems are collected before failing, so the error envelope
/// reports every offending field at once.
///
/// On success returns the parsed input plus non-blocking warnings
/// (currently only `lingua_missing`).
pub fn validate_input(
    raw: &Value,
    config: &PipelineConfig,
) -> Result<(ExtractionInput, Vec<FieldIssue>)> {
    let mut errors: Vec<FieldIssue> = Vec::new();
    let mut warnings: Vec<FieldIssue> = Vec::new();

    let map = match raw.as_object() {
        Some(map) => map,
        None => {
            return Err(Error::InvalidInput(vec![FieldIssue::new(
                "$",
                "input must be a JSON object",
                "type_error",
            )]));
        }
    };

    let id_conversazione = required_string(map, "id_conversazione", &mut errors);
    let id_messaggio = required_string(map, "id_messaggio", &mut errors);
    let testo = required_string(map, "testo_normalizzato", &mut errors);
    let timestamp = required_string(map, "timestamp", &mut errors);
    let mittente = required_string(map, "mittente", &mut errors);
    let destinatario = required_string(map, "destinatario", &mut errors);

    let lingua = match map.get("lingua") {
        None | Some(Value::Null) => {
            warnings.push(FieldIssue::new(
                "lingua",
                "lingua is null; NER engine will be skipped for this message",
                "lingua_missing",
            ));
            None
        }
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_lowercase()),
        Some(Value::String(_)) => {
            errors.push(FieldIssue::new(
                "lingua",
                "lingua must be a non-empty string or null",
                "type_error",
            ));
            None
        }
        Some(_) => {
            errors.push(FieldIssue::new(
                "lingua",
                "lingua must be a string or null",
                "type_error",
            ));
            None
        }
    };

    if let Some(text) = &testo {
        if text.trim().is_empty() {
            errors.push(FieldIssue::new(
                "testo_normalizzato",
                "must not be empty or whitespace-only",
                "empty_text",
            ));
        } else {
            let chars = text.chars().count();
            if chars > config.max_text_length {
                errors.push(FieldIssue::new(
                    "testo_normalizzato",
                    format!(
                        "exceeds maximum allowed length of {} chars (got {chars})",
                        config.max_text_length
                    ),
                    "text_too_long",
                ));
            } else if HTML_TAG.is_match(text) {
                errors.push(FieldIssue::new(
                    "testo_normalizzato",
                    "must not contain raw HTML tags; strip HTML before this layer",
                    "html_detected",
                ));
            }
        }
    }

    let pre_annotazioni = optional_passthrough(map, "pre_annotazioni", &mut errors);
    let regole_routing = optional_passthrough(map, "regole_routing", &mut errors);
    let tag_upstream = optional_passthrough(map, "tag_upstream", &mut errors);

    if !errors.is_empty() {
        return Err(Error::InvalidInput(errors));
    }

    // All required fields are Some at this point; unwrap_or keeps the
    // function panic-free regardless.
    let parsed = ExtractionInput {
        id_conversazione: id_conversazione.unwrap_or_default(),
        id_messaggio: id_messaggio.unwrap_or_default(),
        testo_normalizzato: testo.unwrap_or_default(),
        lingua,
        timestamp: timestamp.unwrap_or_default(),
        mittente: mittente.unwrap_or_default(),
        destinatario: destinatario.unwrap_or_default(),
        pre_annotazioni,
        regole_routing,
        tag_upstream,
    };

    Ok((parsed, warnings))
}

fn required_string(
    map: &serde_json::Map<String, Value>,
    field: &str,
    errors: &mut Vec<FieldIssue>,
) -> Option<String> {
    match map.get(field) {
        None | Some(Value::Null) => {
            errors.push(FieldIssue::new(field, "field is required", "missing"));
            None
        }
        Some(Value::String(s)) => {
            if s.is_empty() && field != "testo_normalizzato" {
                errors.push(FieldIssue::new(field, "must not be empty", "empty"));
                None
            } else {
                Some(s.clone())
            }
        }
        Some(other) => {
            errors.push(FieldIssue::new(
                field,
                format!("expected a string, got {}", json_type_name(other)),
                "type_error",
            ));
            None
        }
    }
}

fn optional_passthrough(
    map: &serde_json::Map<String, Value>,
    field: &str,
    errors: &mut Vec<FieldIssue>,
) -> Option<Value> {
    match map.get(field) {
        None | Some(Value::Null) => None,
        Some(v @ Value::Array(_)) => Some(v.clone()),
        Some(other) => {
            errors.push(FieldIssue::new(
                field,
                format!("expected a list, got {}", json_type_name(other)),
                "type_error",
            ));
            None
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
