//! Deterministic text canonicalization.
//!
//! Four steps, always applied in order:
//!   1. Unicode NFKC compatibility normalization.
//!   2. Strip leading/trailing whitespace.
//!   3. Collapse runs of spaces and tabs to a single space.
//!   4. Collapse runs of newlines to a single `\n`.
//!
//! Each step is recorded in a [`NormalizationLog`] with before/after
//! lengths so the transformation can be replayed offline. The function is
//! idempotent: `normalize(normalize(t).0).0 == normalize(t).0`.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static MULTI_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static MULTI_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

/// A single deterministic transformation applied to the text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NormalizationStep {
    /// Step tag (`unicode_nfkc`, `strip`, `dedup_spaces`, `dedup_newlines`).
    pub name: &'static str,
    /// Text length in chars before this step.
    pub chars_before: usize,
    /// Text length in chars after this step.
    pub chars_after: usize,
}

/// Ordered record of the transformations applied during one run.
///
/// Lives only for the duration of a single pipeline run; used for audit
/// logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct NormalizationLog {
    /// Applied steps, in order.
    pub steps: Vec<NormalizationStep>,
}

impl NormalizationLog {
    fn add(&mut self, name: &'static str, before: usize, after: usize) {
        self.steps.push(NormalizationStep {
            name,
            chars_before: before,
            chars_after: after,
        });
    }
}

/// Apply the four canonicalization steps, returning the transformed text
/// and the replayable log.
#[must_use]
pub fn normalize(text: &str) -> (String, NormalizationLog) {
    let mut log = NormalizationLog::default();

    let before = text.chars().count();
    let current: String = text.nfkc().collect();
    let mut len = current.chars().count();
    log.add("unicode_nfkc", before, len);

    let before = len;
    let current = current.trim().to_string();
    len = current.chars().count();
    log.add("strip", before, len);

    let before = len;
    let current = MULTI_SPACES.replace_all(&current, " ").into_owned();
    len = current.chars().count();
    log.add("dedup_spaces", before, len);

    let before = len;
    let current = MULTI_NEWLINES.replace_all(&current, "\n").into_owned();
    len = current.chars().count();
    log.add("dedup_newlines", before, len);

    (current, log)
}
