//! Post-extraction filters, applied in fixed order after resolution:
//!
//!   1. [`filter_empty`]: final safety net against invalid values.
//!   2. [`apply_blacklist`]: case-insensitive drop list.
//!   3. [`apply_type_flags`]: drop explicitly disabled entity types.
//!   4. [`canonicalize`]: rewrite values to standard representations
//!      (ISO dates, dot-decimal amounts, uppercase identifiers).
//!
//! Canonicalization replaces only `value`; the span still points at the
//! original substring of the normalized text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::PipelineConfig;
use crate::entity::{Entity, EntityKind};

static DATE_PARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{2,4})$").expect("valid regex"));

// Integer part is either dot-grouped thousands or a plain digit run; the
// decimal part accepts comma or dot.
static AMOUNT_PARTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<int>\d{1,3}(?:\.\d{3})+|\d+)(?:[.,](?P<dec>\d{1,2}))?$").expect("valid regex")
});

/// Drop entities with an empty/whitespace value or malformed span.
#[must_use]
pub fn filter_empty(entities: Vec<Entity>) -> Vec<Entity> {
    entities.into_iter().filter(|e| e.is_valid()).collect()
}

/// Drop entities whose value appears (case-insensitively) in the
/// blacklist.
#[must_use]
pub fn apply_blacklist(entities: Vec<Entity>, blacklist: &[String]) -> Vec<Entity> {
    if blacklist.is_empty() {
        return entities;
    }
    let lowered: Vec<String> = blacklist.iter().map(|v| v.to_lowercase()).collect();
    entities
        .into_iter()
        .filter(|e| !lowered.contains(&e.value.to_lowercase()))
        .collect()
}

/// Drop entities whose type is explicitly disabled. Unknown types default
/// to enabled.
#[must_use]
pub fn apply_type_flags(entities: Vec<Entity>, config: &PipelineConfig) -> Vec<Entity> {
    entities
        .into_iter()
        .filter(|e| config.is_entity_type_enabled(&e.kind))
        .collect()
}

/// Rewrite values to their canonical representation:
/// `DATA` → ISO 8601 `YYYY-MM-DD`; `IMPORTO` → dot-decimal with two
/// fraction digits; `CODICEFISCALE`/`PARTITAIVA` → uppercase, whitespace
/// removed. Other types pass through unchanged, as do values the
/// rewriters do not recognize.
#[must_use]
pub fn canonicalize(entities: Vec<Entity>) -> Vec<Entity> {
    entities
        .into_iter()
        .map(|mut e| {
            e.value = match e.kind {
                EntityKind::Data => canonical_date(&e.value),
                EntityKind::Importo => canonical_amount(&e.value),
                EntityKind::CodiceFiscale | EntityKind::PartitaIva => e
                    .value
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_uppercase(),
                _ => e.value,
            };
            e
        })
        .collect()
}

/// Apply all four filters in the canonical order.
#[must_use]
pub fn apply_all(entities: Vec<Entity>, config: &PipelineConfig) -> Vec<Entity> {
    let entities = filter_empty(entities);
    let entities = apply_blacklist(entities, &config.blacklist_values);
    let entities = apply_type_flags(entities, config);
    canonicalize(entities)
}

fn canonical_date(value: &str) -> String {
    let Some(caps) = DATE_PARTS.captures(value.trim()) else {
        return value.to_string();
    };
    let (day, month, year_raw) = (&caps[1], &caps[2], &caps[3]);
    let (Ok(day), Ok(month)) = (day.parse::<u32>(), month.parse::<u32>()) else {
        return value.to_string();
    };
    let Ok(mut year) = year_raw.parse::<u32>() else {
        return value.to_string();
    };
    // Two-digit years: 00-49 land in the 2000s, 50-99 in the 1900s.
    if year_raw.len() == 2 {
        year += if year < 50 { 2000 } else { 1900 };
    }
    format!("{year:04}-{month:02}-{day:02}")
}

fn canonical_amount(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| *c != '€' && !c.is_whitespace())
        .collect();
    let Some(caps) = AMOUNT_PARTS.captures(&cleaned) else {
        return value.to_string();
    };
    let int_part = caps["int"].replace('.', "");
    let dec_part = caps.name("dec").map_or("00".to_string(), |m| {
        format!("{:0<2}", m.as_str())
    });
    format!("{int_part}.{dec_part}")
}
