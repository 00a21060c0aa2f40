//! Counters, histograms and timers for the extraction pipeline.
//!
//! Metric backends are optional collaborators: the core only talks to the
//! [`MetricsSink`] trait and defaults to [`NoopMetrics`], so there is no
//! hard dependency on any telemetry library. A Prometheus or StatsD
//! adapter implements the trait and is handed to the pipeline at
//! construction time.
//!
//! Exported metrics (label values are low-cardinality):
//!
//! | name | kind | labels |
//! |---|---|---|
//! | `entities_per_mail` | histogram | `type` |
//! | `extraction_latency` | histogram (ms) | `component` |
//! | `errors_total` | counter | `kind` (soft/hard), `component` |
//! | `ner_skip_total` | counter | `reason` |
//! | `pipeline_runs` | counter | `outcome` (ok/failed) |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::entity::Entity;

/// Backend interface for metric emission.
///
/// Implementations must be cheap to call on the hot path and must never
/// panic; metric failures are not allowed to affect extraction.
pub trait MetricsSink: Send + Sync {
    /// Increment a counter.
    fn counter(&self, name: &str, labels: &[(&str, &str)], value: u64);

    /// Record an observation into a histogram.
    fn observe(&self, name: &str, labels: &[(&str, &str)], value: f64);
}

/// Sink that drops everything. The default collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn counter(&self, _name: &str, _labels: &[(&str, &str)], _value: u64) {}

    fn observe(&self, _name: &str, _labels: &[(&str, &str)], _value: f64) {}
}

/// Handle used by the pipeline; wraps the sink with the metric names and
/// label conventions of this layer.
#[derive(Clone)]
pub struct Metrics {
    sink: Arc<dyn MetricsSink>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::noop()
    }
}

impl Metrics {
    /// Wrap a concrete sink.
    #[must_use]
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    /// A handle whose every call is a no-op.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            sink: Arc::new(NoopMetrics),
        }
    }

    /// Record entity counts per type for one mail.
    pub fn entity_counts(&self, entities: &[Entity]) {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for e in entities {
            *counts.entry(e.kind.as_label()).or_insert(0) += 1;
        }
        for (label, count) in counts {
            self.sink
                .observe("entities_per_mail", &[("type", label)], count as f64);
        }
    }

    /// Count an error by kind (`soft`/`hard`) and component.
    pub fn error(&self, kind: &str, component: &str) {
        self.sink.counter(
            "errors_total",
            &[("kind", kind), ("component", component)],
            1,
        );
    }

    /// Count a NER engine skip by reason.
    pub fn ner_skip(&self, reason: &str) {
        self.sink.counter("ner_skip_total", &[("reason", reason)], 1);
    }

    /// Count a pipeline run by outcome (`ok`/`failed`).
    pub fn run_outcome(&self, outcome: &str) {
        self.sink.counter("pipeline_runs", &[("outcome", outcome)], 1);
    }

    /// Start timing a component.
    #[must_use]
    pub fn timer(&self, component: &'static str) -> Timer {
        Timer {
            component,
            started: Instant::now(),
        }
    }

    fn observe_latency(&self, component: &str, elapsed_ms: f64) {
        self.sink.observe(
            "extraction_latency",
            &[("component", component)],
            elapsed_ms,
        );
    }
}

/// Scoped timer for one pipeline component.
///
/// [`Timer::stop`] records the elapsed milliseconds into the
/// `extraction_latency` histogram and returns them so the orchestrator can
/// also store them in `meta.component_timings_ms`.
pub struct Timer {
    component: &'static str,
    started: Instant,
}

impl Timer {
    /// Stop the timer, emit the latency metric, and return elapsed ms.
    pub fn stop(self, metrics: &Metrics) -> f64 {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        metrics.observe_latency(self.component, elapsed_ms);
        elapsed_ms
    }

    /// Component this timer measures.
    #[must_use]
    pub fn component(&self) -> &'static str {
        self.component
    }
}
