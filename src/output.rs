//! Output envelope for the extraction pipeline.
//!
//! The envelope is always serializable to valid JSON, even on hard failure
//! (`entities` empty, `meta.status = "failed"`). The orchestrator builds it
//! incrementally and serializes it once processing is complete.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::LAYER_VERSION;
use crate::entity::Entity;
use crate::error::FieldIssue;

/// One entry of the envelope's `errors` list.
///
/// Validation problems carry a `field`; engine and pipeline faults carry a
/// `component`. `type` is a stable machine-readable tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Offending input field, for validation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Originating component, for engine/pipeline errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Stable machine-readable tag (`missing`, `text_too_long`, `soft`,
    /// `internal`, …).
    #[serde(rename = "type")]
    pub kind: String,
}

impl ErrorRecord {
    /// Record for a validation problem on a named field.
    #[must_use]
    pub fn for_field(issue: &FieldIssue) -> Self {
        Self {
            field: Some(issue.field.clone()),
            component: None,
            message: issue.message.clone(),
            kind: issue.kind.clone(),
        }
    }

    /// Record for a component-level problem.
    #[must_use]
    pub fn for_component(
        component: impl Into<String>,
        message: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            field: None,
            component: Some(component.into()),
            message: message.into(),
            kind: kind.into(),
        }
    }
}

/// Envelope metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Conversation identifier (UNKNOWN when validation failed early).
    pub id_conversazione: String,
    /// Message identifier (UNKNOWN when validation failed early).
    pub id_messaggio: String,
    /// `ok` or `failed`.
    pub status: String,
    /// Version of this extraction layer.
    pub layer_version: String,
    /// Wall-clock total for the run, milliseconds.
    pub processing_time_ms: f64,
    /// Per-component elapsed milliseconds.
    pub component_timings_ms: BTreeMap<String, f64>,
    /// Engine feature flags in effect for this run.
    pub feature_flags: BTreeMap<String, bool>,
    /// Recorded skip/fallback decisions (e.g. NER skip reasons).
    pub fallbacks: Vec<String>,
    /// Number of entities in the envelope.
    pub entity_count: usize,
}

/// The full output contract: `entities` + `meta` + `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Final entity list (possibly empty).
    pub entities: Vec<Entity>,
    /// Run metadata.
    pub meta: Meta,
    /// Blocking and non-blocking errors.
    pub errors: Vec<ErrorRecord>,
}

impl ExtractionOutput {
    /// Start building an envelope for the given message.
    #[must_use]
    pub fn new(id_conversazione: impl Into<String>, id_messaggio: impl Into<String>) -> Self {
        Self {
            entities: Vec::new(),
            meta: Meta {
                id_conversazione: id_conversazione.into(),
                id_messaggio: id_messaggio.into(),
                status: "ok".to_string(),
                layer_version: LAYER_VERSION.to_string(),
                processing_time_ms: 0.0,
                component_timings_ms: BTreeMap::new(),
                feature_flags: BTreeMap::new(),
                fallbacks: Vec::new(),
                entity_count: 0,
            },
            errors: Vec::new(),
        }
    }

    /// Set the engine feature flags recorded in `meta`.
    pub fn set_feature_flags(&mut self, regex: bool, ner: bool, lexicon: bool) {
        self.meta.feature_flags.insert("engine_regex".into(), regex);
        self.meta.feature_flags.insert("engine_ner".into(), ner);
        self.meta
            .feature_flags
            .insert("engine_lexicon".into(), lexicon);
    }

    /// Set the final entity list.
    pub fn set_entities(&mut self, entities: Vec<Entity>) {
        self.meta.entity_count = entities.len();
        self.entities = entities;
    }

    /// Record a non-blocking error. The pipeline continues and returns
    /// partial results.
    pub fn add_error(&mut self, record: ErrorRecord) {
        self.errors.push(record);
    }

    /// Register a fallback activation (e.g. a NER skip reason).
    pub fn add_fallback(&mut self, reason: impl Into<String>) {
        self.meta.fallbacks.push(reason.into());
    }

    /// Mark the extraction as hard-failed; `entities` is emptied.
    pub fn set_failed(&mut self) {
        self.meta.status = "failed".to_string();
        self.entities.clear();
        self.meta.entity_count = 0;
    }

    /// Record elapsed milliseconds for a named pipeline component.
    pub fn record_timing(&mut self, component: &str, elapsed_ms: f64) {
        self.meta
            .component_timings_ms
            .insert(component.to_string(), elapsed_ms);
    }

    /// Stamp the total processing time from `started`.
    pub fn finish(&mut self, started: Instant) {
        self.meta.processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    }

    /// True if the run hard-failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.meta.status == "failed"
    }

    /// Serialize to a JSON string. Never fails: falls back to a minimal
    /// hand-built envelope if the serializer errors out.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            format!(
                r#"{{"entities":[],"meta":{{"id_conversazione":{},"id_messaggio":{},"status":"failed","layer_version":"{}","processing_time_ms":0.0,"component_timings_ms":{{}},"feature_flags":{{}},"fallbacks":[],"entity_count":0}},"errors":[{{"component":"serializer","message":{},"type":"internal"}}]}}"#,
                serde_json::Value::String(self.meta.id_conversazione.clone()),
                serde_json::Value::String(self.meta.id_messaggio.clone()),
                LAYER_VERSION,
                serde_json::Value::String(err.to_string()),
            )
        })
    }
}
