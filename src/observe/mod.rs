//! Observability: structured JSON logging and optional metrics.

pub mod logging;
pub mod metrics;

pub use logging::PipelineLogger;
pub use metrics::{Metrics, MetricsSink, NoopMetrics, Timer};
