//! # estratto
//!
//! Entity extraction core for an email-triage pipeline. Given a
//! normalized email message (text plus metadata), it produces a
//! deterministic list of typed entities (email addresses, fiscal codes,
//! VAT numbers, IBANs, phone numbers, dates, amounts, case numbers,
//! organizations) with span, confidence, provenance and version
//! information, wrapped in a stable JSON envelope.
//!
//! - **Regex engine**: curated high-precision pattern set
//! - **NER engine**: external statistical tagger behind a thread-safe
//!   model cache, with selective gating and a hard timeout
//! - **Lexicon engine**: lemma-based dictionary lookup
//! - **Resolver**: deterministic dedup + priority-based conflict
//!   resolution + stable ordering
//!
//! The orchestrator guarantees a valid JSON envelope under every failure
//! mode: no internal failure ever escapes to the caller.
//!
//! ```rust
//! use estratto::run_pipeline;
//! use serde_json::json;
//!
//! let output = run_pipeline(
//!     &json!({
//!         "id_conversazione": "CONV-001",
//!         "id_messaggio": "MSG-001",
//!         "testo_normalizzato": "Contatto: mario.rossi@example.com",
//!         "lingua": "it",
//!         "timestamp": "2026-02-03T10:00:00Z",
//!         "mittente": "cliente@example.it",
//!         "destinatario": "assistenza@example.it"
//!     }),
//!     None,
//! );
//! assert_eq!(output.meta.status, "ok");
//! assert_eq!(output.entities[0].value, "mario.rossi@example.com");
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod engines;
pub mod entity;
pub mod error;
pub mod filters;
pub mod input;
pub mod normalize;
pub mod offset;
pub mod output;
pub mod pipeline;
pub mod resolve;
pub mod sync;

pub mod observe;

pub use observe::{Metrics, MetricsSink, NoopMetrics, PipelineLogger, Timer};

pub use config::{PipelineConfig, LAYER_VERSION};
pub use engines::{
    extract_lexicon, extract_regex, Gazetteer, MockTagger, NerEngine, SkipReason, TaggedSpan,
    Tagger, TaggerLoader,
};
pub use entity::{Entity, EntityKind, Source, Span};
pub use error::{Error, FieldIssue, Result};
pub use input::{validate_input, ExtractionInput};
pub use normalize::{normalize, NormalizationLog, NormalizationStep};
pub use output::{ErrorRecord, ExtractionOutput, Meta};
pub use pipeline::{extract_all_entities, run_pipeline, Pipeline};
pub use resolve::merge;
