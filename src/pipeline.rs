//! Pipeline orchestration: the seven-step extraction flow.
//!
//!   1. Input validation; a hard failure emits the failed envelope and
//!      stops; warnings are attached and the run continues.
//!   2. Deterministic text normalization.
//!   3. Regex engine (if enabled).
//!   4. Selective NER engine; skip reasons land in `meta.fallbacks`.
//!   5. Lexicon engine (if enabled).
//!   6. Deterministic merge.
//!   7. Post-filters, then envelope assembly.
//!
//! Everything after validation runs under a single panic barrier: no
//! internal failure ever escapes to the caller, and the returned envelope
//! is always a valid JSON document.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use serde_json::json;

use crate::config::PipelineConfig;
use crate::engines::lexicon::{extract_lexicon, Gazetteer};
use crate::engines::ner::{NerEngine, TaggerLoader};
use crate::engines::regex::extract_regex;
use crate::entity::Entity;
use crate::error::Error;
use crate::filters::apply_all;
use crate::input::{validate_input, ExtractionInput};
use crate::normalize::normalize;
use crate::observe::{Metrics, PipelineLogger};
use crate::output::{ErrorRecord, ExtractionOutput};
use crate::resolve::merge;

/// The extraction pipeline with its collaborators.
///
/// Construction wires the optional pieces (metrics sink, gazetteer, NER
/// model loader); [`Pipeline::run`] is then synchronous and side-effect
/// free apart from logging and metrics. A single `Pipeline` can serve
/// many calls concurrently: per-call state is owned by the call, and the
/// only shared mutable state is the mutex-guarded NER model cache.
pub struct Pipeline {
    config: PipelineConfig,
    metrics: Metrics,
    gazetteer: Gazetteer,
    ner: NerEngine,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// Pipeline with the given config, no metrics sink, no gazetteer and
    /// no NER model loader.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            metrics: Metrics::noop(),
            gazetteer: Gazetteer::new(),
            ner: NerEngine::new(),
        }
    }

    /// Attach a metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Attach a gazetteer for the lexicon engine.
    #[must_use]
    pub fn with_gazetteer(mut self, gazetteer: Gazetteer) -> Self {
        self.gazetteer = gazetteer;
        self
    }

    /// Attach a loader for the NER model adapter.
    #[must_use]
    pub fn with_tagger_loader(mut self, loader: TaggerLoader) -> Self {
        self.ner = NerEngine::with_loader(loader);
        self
    }

    /// The config this pipeline runs with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Drain the NER model cache (test isolation).
    pub fn clear_model_cache(&self) {
        self.ner.clear_cache();
    }

    /// Execute the full pipeline over a raw input map.
    ///
    /// Always returns a well-formed envelope; on hard failure
    /// `meta.status` is `"failed"`, `errors` is non-empty and `entities`
    /// is empty.
    pub fn run(&self, raw: &serde_json::Value) -> ExtractionOutput {
        let started = Instant::now();

        let timer = self.metrics.timer("validate");
        let validation = validate_input(raw, &self.config);
        let validate_ms = timer.stop(&self.metrics);

        let (input, warnings) = match validation {
            Ok(parsed) => parsed,
            Err(err) => {
                let records = match err {
                    Error::InvalidInput(issues) => {
                        issues.iter().map(ErrorRecord::for_field).collect()
                    }
                    other => vec![ErrorRecord::for_component(
                        "input_validator",
                        other.to_string(),
                        "internal",
                    )],
                };
                self.metrics.error("hard", "input_validator");
                self.metrics.run_outcome("failed");
                log::error!("pipeline hard failure (input validation)");
                return self.failed_output("UNKNOWN", "UNKNOWN", records, validate_ms, started);
            }
        };

        let barrier = catch_unwind(AssertUnwindSafe(|| {
            self.run_engines(&input, &warnings, validate_ms, started)
        }));

        match barrier {
            Ok(output) => {
                self.metrics.run_outcome("ok");
                output
            }
            Err(panic) => {
                let message = panic_message(&panic);
                self.metrics.error("hard", "pipeline");
                self.metrics.run_outcome("failed");
                log::error!("pipeline unexpected hard failure: {message}");
                self.failed_output(
                    &input.id_conversazione,
                    &input.id_messaggio,
                    vec![ErrorRecord::for_component(
                        "pipeline",
                        format!("unexpected error: {message}"),
                        "internal",
                    )],
                    validate_ms,
                    started,
                )
            }
        }
    }

    /// Steps 2-7; runs inside the panic barrier.
    fn run_engines(
        &self,
        input: &ExtractionInput,
        warnings: &[crate::error::FieldIssue],
        validate_ms: f64,
        started: Instant,
    ) -> ExtractionOutput {
        let config = &self.config;
        let mut output = ExtractionOutput::new(&input.id_conversazione, &input.id_messaggio);
        output.set_feature_flags(
            config.engine_regex_enabled,
            config.engine_ner_enabled,
            config.engine_lexicon_enabled,
        );
        output.record_timing("validate", validate_ms);

        let logger = PipelineLogger::new(&input.id_conversazione, &input.id_messaggio);

        for warning in warnings {
            output.add_error(ErrorRecord::for_field(warning));
            self.metrics.error("soft", "input_validator");
        }

        // Step 2: normalization
        let timer = self.metrics.timer("normalize");
        let (text, norm_log) = normalize(&input.testo_normalizzato);
        output.record_timing("normalize", timer.stop(&self.metrics));
        logger.debug("text_normalized", json!({ "steps": norm_log.steps.len() }));

        let mut candidates: Vec<Entity> = Vec::new();

        // Step 3: regex engine
        if config.engine_regex_enabled {
            let timer = self.metrics.timer("regex");
            let regex_entities = extract_regex(&text, config);
            output.record_timing("regex", timer.stop(&self.metrics));
            logger.debug("regex_done", json!({ "count": regex_entities.len() }));
            candidates.extend(regex_entities);
        } else {
            output.add_fallback("regex_disabled");
            logger.fallback("regex", "engine disabled");
        }

        // Step 4: selective NER engine (gating happens inside)
        let timer = self.metrics.timer("ner");
        let (ner_entities, skip_reasons) =
            self.ner.extract(&text, input.lingua.as_deref(), config);
        output.record_timing("ner", timer.stop(&self.metrics));
        for reason in &skip_reasons {
            let reason = reason.to_string();
            logger.fallback("ner", &reason);
            self.metrics.ner_skip(&reason);
            output.add_fallback(reason);
        }
        logger.debug(
            "ner_done",
            json!({ "count": ner_entities.len(), "skipped": !skip_reasons.is_empty() }),
        );
        candidates.extend(ner_entities);

        // Step 5: lexicon engine
        if config.engine_lexicon_enabled {
            let timer = self.metrics.timer("lexicon");
            let lexicon_entities = extract_lexicon(&text, &self.gazetteer, config);
            output.record_timing("lexicon", timer.stop(&self.metrics));
            logger.debug("lexicon_done", json!({ "count": lexicon_entities.len() }));
            candidates.extend(lexicon_entities);
        } else {
            output.add_fallback("lexicon_disabled");
            logger.fallback("lexicon", "engine disabled");
        }

        // Step 6: deterministic merge
        let timer = self.metrics.timer("merge");
        let merged = merge(&candidates, config);
        output.record_timing("merge", timer.stop(&self.metrics));
        logger.debug("merge_done", json!({ "count": merged.len() }));

        // Step 7: post-filters + envelope
        let timer = self.metrics.timer("filter");
        let filtered = apply_all(merged, config);
        output.record_timing("filter", timer.stop(&self.metrics));

        self.metrics.entity_counts(&filtered);
        logger.entity_summary(&filtered);
        output.set_entities(filtered);
        output.finish(started);
        output
    }

    /// Document-level extraction over a bare string: wraps the text in a
    /// minimal input, runs the engines and returns only the entity list,
    /// without the envelope.
    #[must_use]
    pub fn extract_entities(&self, text: &str) -> Vec<Entity> {
        let config = &self.config;
        let input = ExtractionInput::from_text(text);
        let (normalized, _) = normalize(&input.testo_normalizzato);

        let mut candidates: Vec<Entity> = Vec::new();
        if config.engine_regex_enabled {
            candidates.extend(extract_regex(&normalized, config));
        }
        let (ner_entities, _) = self.ner.extract(&normalized, input.lingua.as_deref(), config);
        candidates.extend(ner_entities);
        if config.engine_lexicon_enabled {
            candidates.extend(extract_lexicon(&normalized, &self.gazetteer, config));
        }

        apply_all(merge(&candidates, config), config)
    }

    fn failed_output(
        &self,
        id_conversazione: &str,
        id_messaggio: &str,
        records: Vec<ErrorRecord>,
        validate_ms: f64,
        started: Instant,
    ) -> ExtractionOutput {
        let mut output = ExtractionOutput::new(id_conversazione, id_messaggio);
        output.set_feature_flags(
            self.config.engine_regex_enabled,
            self.config.engine_ner_enabled,
            self.config.engine_lexicon_enabled,
        );
        output.record_timing("validate", validate_ms);
        for record in records {
            output.add_error(record);
        }
        output.set_failed();
        output.finish(started);
        output
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Execute the full pipeline over a raw input map with an ad-hoc
/// pipeline. The primary entry point for hosts that do not need custom
/// collaborators.
#[must_use]
pub fn run_pipeline(raw: &serde_json::Value, config: Option<PipelineConfig>) -> ExtractionOutput {
    Pipeline::new(config.unwrap_or_default()).run(raw)
}

/// Document-level extraction over a bare string.
///
/// Builds a minimal input around the text and returns only the entity
/// list. Production callers should prefer [`run_pipeline`], which returns
/// the full envelope with meta and errors.
#[must_use]
pub fn extract_all_entities(text: &str, config: Option<PipelineConfig>) -> Vec<Entity> {
    Pipeline::new(config.unwrap_or_default()).extract_entities(text)
}
