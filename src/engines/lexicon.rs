//! Lexicon engine: lemma-based dictionary lookup.
//!
//! A [`Gazetteer`] maps lemmas to entity labels (`"ACME S.p.A."` →
//! `AZIENDA`). Matching is case-insensitive and word-bounded; the entity
//! `value` preserves the original casing from the text, and the entity
//! type is always the **entity label**, never the lemma itself.

use crate::config::PipelineConfig;
use crate::entity::{Entity, EntityKind, Source};

/// One gazetteer entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    /// Surface form to look up in the text.
    pub lemma: String,
    /// Entity label assigned to matches of this lemma.
    pub label: EntityKind,
}

/// Ordered lemma → entity-label dictionary.
///
/// Entries keep insertion order so candidate emission (and therefore
/// resolver tie-breaking on input order) is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
}

impl Gazetteer {
    /// Create an empty gazetteer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lemma with its entity label.
    pub fn insert(&mut self, lemma: impl Into<String>, label: EntityKind) {
        self.entries.push(GazetteerEntry {
            lemma: lemma.into(),
            label,
        });
    }

    /// Build from `(lemma, label)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, EntityKind)>,
        S: Into<String>,
    {
        let mut gazetteer = Self::new();
        for (lemma, label) in pairs {
            gazetteer.insert(lemma, label);
        }
        gazetteer
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the gazetteer has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan the normalized text for gazetteer lemmas.
///
/// Matches are case-insensitive with word boundaries on both sides
/// (neighboring chars must not be alphanumeric). Disabled entity types
/// are skipped; empty/whitespace matches are dropped.
#[must_use]
pub fn extract_lexicon(text: &str, gazetteer: &Gazetteer, config: &PipelineConfig) -> Vec<Entity> {
    let text_chars: Vec<char> = text.chars().collect();
    let mut entities = Vec::new();

    for entry in gazetteer.entries() {
        if !config.is_entity_type_enabled(&entry.label) {
            continue;
        }
        let lemma_chars: Vec<char> = entry.lemma.chars().collect();
        if lemma_chars.is_empty() || text_chars.len() < lemma_chars.len() {
            continue;
        }

        let window = lemma_chars.len();
        for start in 0..=text_chars.len() - window {
            let end = start + window;
            if !eq_ignore_case(&text_chars[start..end], &lemma_chars) {
                continue;
            }
            let before_ok = start == 0 || !text_chars[start - 1].is_alphanumeric();
            let after_ok = end == text_chars.len() || !text_chars[end].is_alphanumeric();
            if !(before_ok && after_ok) {
                continue;
            }

            let value: String = text_chars[start..end].iter().collect();
            if value.trim().is_empty() {
                continue;
            }
            entities.push(Entity::new(
                entry.label.clone(),
                value,
                start,
                end,
                Source::Lexicon,
                config.lexicon_confidence,
                config.lexicon_version.clone(),
            ));
        }
    }

    entities
}

fn eq_ignore_case(a: &[char], b: &[char]) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| x.to_lowercase().eq(y.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azienda_gazetteer() -> Gazetteer {
        Gazetteer::from_pairs([("ACME", EntityKind::Azienda)])
    }

    #[test]
    fn label_is_entity_label_not_lemma() {
        let config = PipelineConfig::default();
        let e = extract_lexicon("Contratto con ACME in scadenza", &azienda_gazetteer(), &config);
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].kind, EntityKind::Azienda);
        assert_ne!(e[0].kind.as_label(), "ACME");
        assert_eq!(e[0].value, "ACME");
    }

    #[test]
    fn match_is_case_insensitive_value_keeps_original_casing() {
        let config = PipelineConfig::default();
        let e = extract_lexicon("sollecito da acme ricevuto", &azienda_gazetteer(), &config);
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].value, "acme");
        assert_eq!(e[0].kind, EntityKind::Azienda);
    }

    #[test]
    fn word_boundaries_are_enforced() {
        let config = PipelineConfig::default();
        let e = extract_lexicon("ACMEX non conta, nemmeno XACME", &azienda_gazetteer(), &config);
        assert!(e.is_empty());
    }

    #[test]
    fn multi_word_lemma_matches() {
        let config = PipelineConfig::default();
        let gazetteer = Gazetteer::from_pairs([("ACME S.p.A.", EntityKind::Azienda)]);
        let text = "Fattura di ACME S.p.A. ricevuta";
        let e = extract_lexicon(text, &gazetteer, &config);
        assert_eq!(e.len(), 1);
        assert_eq!(e[0].value, "ACME S.p.A.");
        assert_eq!(e[0].span.start, 11);
        assert_eq!(e[0].span.end, 22);
    }

    #[test]
    fn repeated_lemma_matches_every_occurrence() {
        let config = PipelineConfig::default();
        let e = extract_lexicon("ACME scrive, ACME risponde", &azienda_gazetteer(), &config);
        assert_eq!(e.len(), 2);
        assert!(e[0].span.start < e[1].span.start);
    }

    #[test]
    fn spans_are_char_offsets() {
        let config = PipelineConfig::default();
        let e = extract_lexicon("è ACME", &azienda_gazetteer(), &config);
        assert_eq!(e[0].span.start, 2);
        assert_eq!(e[0].span.end, 6);
    }

    #[test]
    fn disabled_label_is_skipped() {
        let mut config = PipelineConfig::default();
        config
            .entity_types_enabled
            .insert("AZIENDA".to_string(), false);
        let e = extract_lexicon("ACME", &azienda_gazetteer(), &config);
        assert!(e.is_empty());
    }

    #[test]
    fn confidence_and_version_come_from_config() {
        let config = PipelineConfig {
            lexicon_confidence: 0.42,
            lexicon_version: "lexicon-v2.0".to_string(),
            ..Default::default()
        };
        let e = extract_lexicon("ACME", &azienda_gazetteer(), &config);
        assert_eq!(e[0].confidence, 0.42);
        assert_eq!(e[0].version, "lexicon-v2.0");
        assert_eq!(e[0].source, Source::Lexicon);
    }

    #[test]
    fn empty_gazetteer_yields_nothing() {
        let config = PipelineConfig::default();
        let e = extract_lexicon("ACME ovunque", &Gazetteer::new(), &config);
        assert!(e.is_empty());
    }
}
