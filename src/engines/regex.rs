//! Regex engine: high-precision extraction from a curated pattern set.
//!
//! Patterns target Italian email-triage entities. Two of them are
//! deliberately anchored to avoid false positives on arbitrary digit runs:
//! - PARTITAIVA requires the `IT` country prefix, or an explicit
//!   `P.IVA` / `partita iva` label within a small window (the span then
//!   covers only the 11 digits);
//! - TELEFONO is exactly three disjoint shapes (`+39` international,
//!   `0`-leading landline, `3`-leading mobile).
//!
//! Every candidate carries `source=regex`, the configured confidence and
//! the regex rule version. Spans are character offsets into the
//! normalized text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::PipelineConfig;
use crate::entity::{Entity, EntityKind, Source};
use crate::offset::SpanConverter;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
});

// 6 letters (surname+name), 2 digits (year), month letter, 2 digits
// (day+gender), municipality letter + 3 digits, control letter.
static CODICE_FISCALE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[A-Z]{6}\d{2}[A-Z]\d{2}[A-Z]\d{3}[A-Z]\b").expect("valid regex")
});

static PARTITA_IVA_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bIT ?\d{11}\b").expect("valid regex"));

// Label-anchored variant: the capture group keeps the span on the digits.
static PARTITA_IVA_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:P\.?\s?IVA|partita\s+iva)[\s:]*(\d{11})\b").expect("valid regex")
});

static IBAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b").expect("valid regex"));

static TELEFONO_INTL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+39 ?\d{9,10}\b").expect("valid regex"));

static TELEFONO_FISSO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b0\d{1,3}[ .\-]?\d{6,8}\b").expect("valid regex"));

static TELEFONO_MOBILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b3\d{2}[ .\-]?\d{3}[ .\-]?\d{4}\b").expect("valid regex"));

static DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:0?[1-9]|[12]\d|3[01])/(?:0?[1-9]|1[0-2])/\d{4}\b|\b(?:0?[1-9]|[12]\d|3[01])-(?:0?[1-9]|1[0-2])-\d{4}\b",
    )
    .expect("valid regex")
});

static IMPORTO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"€ ?(?:\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?|\d+(?:[.,]\d{1,2})?)|(?:\d{1,3}(?:\.\d{3})+(?:,\d{1,2})?|\d+(?:[.,]\d{1,2})?) ?€",
    )
    .expect("valid regex")
});

static NUMERO_PRATICA_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:PRAT|PRT|PRATICA)[ /.\-]?\d[0-9A-Z/\-]{3,15}\b").expect("valid regex")
});

static NUMERO_PRATICA_GENERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bNr?\. ?\d{4,10}\b").expect("valid regex"));

/// `(kind, pattern, span_group)`; `span_group` selects a capture group
/// whose range becomes the entity span (whole match when `None`).
type PatternEntry = (EntityKind, &'static Lazy<Regex>, Option<usize>);

static PATTERNS: Lazy<Vec<PatternEntry>> = Lazy::new(|| {
    vec![
        (EntityKind::Email, &EMAIL, None),
        (EntityKind::CodiceFiscale, &CODICE_FISCALE, None),
        (EntityKind::PartitaIva, &PARTITA_IVA_PREFIXED, None),
        (EntityKind::PartitaIva, &PARTITA_IVA_LABELED, Some(1)),
        (EntityKind::Iban, &IBAN, None),
        (EntityKind::Telefono, &TELEFONO_INTL, None),
        (EntityKind::Telefono, &TELEFONO_FISSO, None),
        (EntityKind::Telefono, &TELEFONO_MOBILE, None),
        (EntityKind::Data, &DATA, None),
        (EntityKind::Importo, &IMPORTO, None),
        (EntityKind::NumeroPratica, &NUMERO_PRATICA_LABELED, None),
        (EntityKind::NumeroPratica, &NUMERO_PRATICA_GENERIC, None),
    ]
});

/// Apply the curated pattern set to the normalized text.
///
/// Disabled entity types are skipped; empty/whitespace matches are
/// dropped. Overlapping candidates (including same-type ones, e.g. an
/// international number also matched as a mobile) are all emitted; the
/// resolver owns conflict resolution.
#[must_use]
pub fn extract_regex(text: &str, config: &PipelineConfig) -> Vec<Entity> {
    let converter = SpanConverter::new(text);
    let mut entities = Vec::new();

    for (kind, pattern, span_group) in PATTERNS.iter() {
        if !config.is_entity_type_enabled(kind) {
            continue;
        }

        match span_group {
            None => {
                for m in pattern.find_iter(text) {
                    push_candidate(&mut entities, kind, m.as_str(), m.start(), m.end(), config, &converter);
                }
            }
            Some(group) => {
                for caps in pattern.captures_iter(text) {
                    if let Some(m) = caps.get(*group) {
                        push_candidate(
                            &mut entities,
                            kind,
                            m.as_str(),
                            m.start(),
                            m.end(),
                            config,
                            &converter,
                        );
                    }
                }
            }
        }
    }

    entities
}

fn push_candidate(
    entities: &mut Vec<Entity>,
    kind: &EntityKind,
    value: &str,
    byte_start: usize,
    byte_end: usize,
    config: &PipelineConfig,
    converter: &SpanConverter,
) {
    if value.trim().is_empty() {
        return;
    }
    entities.push(Entity::new(
        kind.clone(),
        value,
        converter.byte_to_char(byte_start),
        converter.byte_to_char(byte_end),
        Source::Regex,
        config.regex_confidence,
        config.regex_rule_version.clone(),
    ));
}
