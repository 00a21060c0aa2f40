//! Structured JSON logging.
//!
//! Every event is one JSON object per line, carrying the conversation and
//! message identifiers plus an event name and payload, so logs stay
//! parseable by any structured-log aggregator without custom schema
//! registration. Emission goes through the `log` facade; the host process
//! chooses the actual sink.

use serde_json::{json, Value};

use crate::entity::Entity;

const TARGET: &str = "estratto::pipeline";

/// Logger bound to one pipeline run's conversation/message context.
pub struct PipelineLogger {
    ctx: Value,
}

impl PipelineLogger {
    /// Bind a logger to the given identifiers.
    #[must_use]
    pub fn new(id_conversazione: &str, id_messaggio: &str) -> Self {
        Self {
            ctx: json!({
                "id_conversazione": id_conversazione,
                "id_messaggio": id_messaggio,
            }),
        }
    }

    fn line(&self, event: &str, payload: Value) -> String {
        let mut obj = json!({ "event": event });
        if let (Some(map), Some(ctx)) = (obj.as_object_mut(), self.ctx.as_object()) {
            for (k, v) in ctx {
                map.insert(k.clone(), v.clone());
            }
            if let Some(extra) = payload.as_object() {
                for (k, v) in extra {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
        obj.to_string()
    }

    /// Emit a debug-level event.
    pub fn debug(&self, event: &str, payload: Value) {
        log::debug!(target: TARGET, "{}", self.line(event, payload));
    }

    /// Emit an info-level event.
    pub fn info(&self, event: &str, payload: Value) {
        log::info!(target: TARGET, "{}", self.line(event, payload));
    }

    /// Emit a warn-level event.
    pub fn warn(&self, event: &str, payload: Value) {
        log::warn!(target: TARGET, "{}", self.line(event, payload));
    }

    /// Log a compact summary of the extracted entities grouped by type and
    /// source.
    pub fn entity_summary(&self, entities: &[Entity]) {
        let mut summary: serde_json::Map<String, Value> = serde_json::Map::new();
        for e in entities {
            let per_type = summary
                .entry(e.kind.as_label().to_string())
                .or_insert_with(|| json!({}));
            if let Some(map) = per_type.as_object_mut() {
                let count = map
                    .entry(e.source.as_str().to_string())
                    .or_insert(json!(0));
                if let Some(n) = count.as_u64() {
                    *count = json!(n + 1);
                }
            }
        }
        self.info(
            "entity_extraction_complete",
            json!({
                "entity_summary": summary,
                "total_entities": entities.len(),
            }),
        );
    }

    /// Log a fallback activation (component skipped, with reason).
    pub fn fallback(&self, component: &str, reason: &str) {
        self.warn(
            "fallback_activated",
            json!({ "component": component, "reason": reason }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityKind, Source};

    #[test]
    fn line_is_single_parseable_json_object() {
        let logger = PipelineLogger::new("CONV-1", "MSG-1");
        let line = logger.line("step_done", json!({"step": "regex", "count": 3}));
        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "step_done");
        assert_eq!(parsed["id_conversazione"], "CONV-1");
        assert_eq!(parsed["id_messaggio"], "MSG-1");
        assert_eq!(parsed["count"], 3);
    }

    #[test]
    fn entity_summary_counts_by_type_and_source() {
        let logger = PipelineLogger::new("C", "M");
        let entities = vec![
            Entity::new(EntityKind::Email, "a@b.it", 0, 6, Source::Regex, 0.9, "v"),
            Entity::new(EntityKind::Email, "c@d.it", 7, 13, Source::Ner, 0.8, "v"),
        ];
        // Exercise the aggregation path; output goes through the log facade.
        logger.entity_summary(&entities);
    }
}
