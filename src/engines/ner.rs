//! Statistical NER engine.
//!
//! Wraps an external tagger behind the [`Tagger`] call contract. The
//! engine itself never fails: every guard, load failure, timeout or
//! inference error is converted into a [`SkipReason`] and the pipeline
//! continues with the remaining engines.
//!
//! Models are lazy-loaded into a [`ModelCache`] keyed by model name. The
//! cache mutex covers both lookup and miss-insertion, so concurrent
//! misses for the same key load exactly once. Inference runs on a worker
//! thread bounded by `ner_timeout_seconds` with channel-based result
//! delivery; no signal-based timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::config::PipelineConfig;
use crate::entity::{Entity, EntityKind, Source};
use crate::error::Result;
use crate::sync::{lock, Mutex};

/// One span produced by an external tagger, in char offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedSpan {
    /// Surface form.
    pub value: String,
    /// Model label (CoNLL/spaCy style or already canonical).
    pub label: String,
    /// Inclusive start char offset.
    pub start: usize,
    /// Exclusive end char offset.
    pub end: usize,
    /// Raw model confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Call contract of the external statistical tagger.
///
/// Implementations must be safe for concurrent inference; if a model is
/// not, the adapter must serialize its own calls.
pub trait Tagger: Send + Sync {
    /// Run inference over the normalized text.
    fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>>;

    /// Model identifier, for diagnostics.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Loader invoked on a cache miss to materialize a tagger by model name.
pub type TaggerLoader = Arc<dyn Fn(&str) -> Result<Arc<dyn Tagger>> + Send + Sync>;

/// Reason the NER engine did not contribute entities.
///
/// `Display` yields the stable strings recorded in `meta.fallbacks` and
/// the `ner_skip_total{reason}` metric label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// `engine_ner_enabled` is off.
    Disabled,
    /// Input carried no language code.
    LanguageUnknown,
    /// Language not in `supported_ner_languages`.
    LanguageUnsupported,
    /// Text shorter than `min_text_length_for_ner`.
    TextTooShort,
    /// The loader could not materialize the model.
    ModelLoadFailed,
    /// Inference exceeded `ner_timeout_seconds`.
    Timeout,
    /// Inference failed; carries the error class.
    Error(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "ner_disabled"),
            SkipReason::LanguageUnknown => write!(f, "language_unknown"),
            SkipReason::LanguageUnsupported => write!(f, "language_unsupported"),
            SkipReason::TextTooShort => write!(f, "text_too_short"),
            SkipReason::ModelLoadFailed => write!(f, "model_load_failed"),
            SkipReason::Timeout => write!(f, "ner_timeout"),
            SkipReason::Error(class) => write!(f, "ner_error:{class}"),
        }
    }
}

/// Keyed, mutex-guarded model cache.
#[derive(Default)]
pub struct ModelCache {
    models: Mutex<HashMap<String, Arc<dyn Tagger>>>,
}

impl ModelCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached tagger for `name`, loading it on a miss.
    ///
    /// The lock is held across the load so racing misses for the same key
    /// resolve to a single load.
    pub fn get_or_load(&self, name: &str, loader: &TaggerLoader) -> Result<Arc<dyn Tagger>> {
        let mut models = lock(&self.models);
        if let Some(model) = models.get(name) {
            return Ok(Arc::clone(model));
        }
        let model = loader(name)?;
        models.insert(name.to_string(), Arc::clone(&model));
        Ok(model)
    }

    /// Drain the cache (test isolation).
    pub fn clear(&self) {
        lock(&self.models).clear();
    }

    /// Number of cached models.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.models).len()
    }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The NER engine: selective gating + cached model + bounded inference.
pub struct NerEngine {
    cache: ModelCache,
    loader: TaggerLoader,
}

impl Default for NerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NerEngine {
    /// Engine with no model loader: every load attempt reports
    /// `model_load_failed`. The host wires a real adapter via
    /// [`NerEngine::with_loader`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_loader(Arc::new(|name: &str| {
            Err(crate::error::Error::model_init(format!(
                "no tagger loader configured (model '{name}')"
            )))
        }))
    }

    /// Engine backed by the given loader.
    #[must_use]
    pub fn with_loader(loader: TaggerLoader) -> Self {
        Self {
            cache: ModelCache::new(),
            loader,
        }
    }

    /// Drain the model cache (test isolation).
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Extract entities from the normalized text. Never fails; the second
    /// element lists why the engine was skipped (empty when it ran).
    ///
    /// Gating, in order: feature flag, language present, language
    /// supported, minimum length. Then model load, then inference bounded
    /// by `ner_timeout_seconds`.
    pub fn extract(
        &self,
        text: &str,
        lingua: Option<&str>,
        config: &PipelineConfig,
    ) -> (Vec<Entity>, Vec<SkipReason>) {
        if !config.engine_ner_enabled {
            return (Vec::new(), vec![SkipReason::Disabled]);
        }
        if lingua.is_none() {
            return (Vec::new(), vec![SkipReason::LanguageUnknown]);
        }
        if !config.is_language_supported(lingua) {
            return (Vec::new(), vec![SkipReason::LanguageUnsupported]);
        }
        let text_chars = text.chars().count();
        if text_chars < config.min_text_length_for_ner {
            return (Vec::new(), vec![SkipReason::TextTooShort]);
        }

        let tagger = match self.cache.get_or_load(&config.ner_model_name, &self.loader) {
            Ok(tagger) => tagger,
            Err(err) => {
                log::warn!(
                    "NER model '{}' not available: {err}",
                    config.ner_model_name
                );
                return (Vec::new(), vec![SkipReason::ModelLoadFailed]);
            }
        };

        match run_with_deadline(tagger, text, config.ner_timeout_seconds) {
            Ok(spans) => (convert_spans(spans, text_chars, config), Vec::new()),
            Err(reason) => {
                log::warn!("NER inference skipped: {reason}");
                (Vec::new(), vec![reason])
            }
        }
    }
}

/// Run inference on a worker thread, bounded by `timeout_seconds`.
///
/// On expiry the worker keeps running to completion in the background and
/// its result is dropped with the channel; no resources outlive it.
fn run_with_deadline(
    tagger: Arc<dyn Tagger>,
    text: &str,
    timeout_seconds: f64,
) -> std::result::Result<Vec<TaggedSpan>, SkipReason> {
    let (tx, rx) = bounded(1);
    let owned = text.to_string();
    let spawned = std::thread::Builder::new()
        .name("estratto-ner".to_string())
        .spawn(move || {
            let _ = tx.send(tagger.tag(&owned));
        });
    if let Err(err) = spawned {
        return Err(SkipReason::Error(format!("spawn:{err}")));
    }

    // max/min rather than clamp: NaN must land on 0, and from_secs_f64
    // panics on non-finite input.
    let timeout = Duration::from_secs_f64(timeout_seconds.max(0.0).min(3600.0));
    match rx.recv_timeout(timeout) {
        Ok(Ok(spans)) => Ok(spans),
        Ok(Err(err)) => Err(SkipReason::Error(err.class().to_string())),
        Err(RecvTimeoutError::Timeout) => Err(SkipReason::Timeout),
        Err(RecvTimeoutError::Disconnected) => {
            // Worker panicked before sending.
            Err(SkipReason::Error("panic".to_string()))
        }
    }
}

fn convert_spans(
    spans: Vec<TaggedSpan>,
    text_chars: usize,
    config: &PipelineConfig,
) -> Vec<Entity> {
    spans
        .into_iter()
        .filter(|s| !s.value.trim().is_empty())
        .filter(|s| s.start < s.end && s.end <= text_chars)
        .map(|s| {
            Entity::new(
                EntityKind::from_label(&s.label),
                s.value,
                s.start,
                s.end,
                Source::Ner,
                s.confidence.clamp(config.ner_confidence, 1.0),
                config.ner_model_name.clone(),
            )
        })
        .collect()
}

// ============================================================================
// Mock tagger (test support)
// ============================================================================

/// A scripted tagger for tests: returns fixed spans or a fixed error.
#[derive(Clone, Default)]
pub struct MockTagger {
    spans: Vec<TaggedSpan>,
    fail_with: Option<String>,
}

impl MockTagger {
    /// Tagger that returns no spans.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the spans to return on every call.
    #[must_use]
    pub fn with_spans(mut self, spans: Vec<TaggedSpan>) -> Self {
        self.spans = spans;
        self
    }

    /// Make every call fail with an inference error.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }
}

impl Tagger for MockTagger {
    fn tag(&self, _text: &str) -> Result<Vec<TaggedSpan>> {
        match &self.fail_with {
            Some(msg) => Err(crate::error::Error::inference(msg.clone())),
            None => Ok(self.spans.clone()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
