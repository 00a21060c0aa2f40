//! Deterministic entity fusion: dedup, conflict resolution, stable sort.
//!
//! The resolver takes the merged candidate list from the three engines
//! and produces the canonical entity list:
//!
//!   1. Invalid entities (empty value, malformed span) are dropped.
//!   2. Exact duplicates (same `(type, lowercased value, span)`) keep one
//!      representative: best source priority, then higher confidence, then
//!      earliest input order.
//!   3. Overlapping spans of the **same type** conflict: the winner is
//!      picked by source priority, then confidence, then longer span, then
//!      earlier start. Overlaps of different types all survive.
//!   4. Survivors are stably sorted by `(span.start, type, source)` so the
//!      output ordering is fully deterministic across runs.
//!
//! Input entities are never mutated; the resolver reassembles a new list.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::PipelineConfig;
use crate::entity::Entity;

/// Resolve the candidate list into the canonical entity list.
#[must_use]
pub fn merge(candidates: &[Entity], config: &PipelineConfig) -> Vec<Entity> {
    let valid: Vec<&Entity> = candidates.iter().filter(|e| e.is_valid()).collect();
    if valid.is_empty() {
        return Vec::new();
    }

    // Step 2: exact dedup, first-seen representative upgraded in place so
    // input order keeps breaking ties.
    let mut reps: Vec<&Entity> = Vec::new();
    let mut by_key: HashMap<(String, String, usize, usize), usize> = HashMap::new();
    for entity in valid {
        let key = (
            entity.kind.as_label().to_string(),
            entity.value.to_lowercase(),
            entity.span.start,
            entity.span.end,
        );
        match by_key.get(&key) {
            None => {
                by_key.insert(key, reps.len());
                reps.push(entity);
            }
            Some(&i) => {
                if beats_duplicate(entity, reps[i], config) {
                    reps[i] = entity;
                }
            }
        }
    }

    // Step 3: same-type overlap conflicts. Candidates are visited in an
    // order that puts likely winners first (position, longest span, source
    // priority, confidence), mirroring the insert-or-replace scan.
    let mut ordered = reps;
    ordered.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(b.span.end.cmp(&a.span.end))
            .then(config.source_rank(a.source).cmp(&config.source_rank(b.source)))
            .then(cmp_f64(b.confidence, a.confidence))
    });

    let mut kept: Vec<&Entity> = Vec::new();
    for entity in ordered {
        let mut conflicted = false;
        for slot in kept.iter_mut() {
            if slot.kind == entity.kind && slot.overlaps(entity) {
                conflicted = true;
                if wins_conflict(entity, slot, config) {
                    *slot = entity;
                }
                break;
            }
        }
        if !conflicted {
            kept.push(entity);
        }
    }

    // Step 4: stable deterministic ordering.
    kept.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then_with(|| a.kind.as_label().cmp(b.kind.as_label()))
            .then_with(|| a.source.as_str().cmp(b.source.as_str()))
    });

    kept.into_iter().cloned().collect()
}

/// True if `candidate` should replace `current` as the representative of
/// an exact-duplicate group.
fn beats_duplicate(candidate: &Entity, current: &Entity, config: &PipelineConfig) -> bool {
    match config
        .source_rank(candidate.source)
        .cmp(&config.source_rank(current.source))
    {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => candidate.confidence > current.confidence,
    }
}

/// True if `candidate` wins a same-type overlap conflict against `current`.
fn wins_conflict(candidate: &Entity, current: &Entity, config: &PipelineConfig) -> bool {
    config
        .source_rank(candidate.source)
        .cmp(&config.source_rank(current.source))
        .then(cmp_f64(current.confidence, candidate.confidence))
        .then(current.span_len().cmp(&candidate.span_len()))
        .then(current.span.start.cmp(&candidate.span.start).reverse())
        == Ordering::Less
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
