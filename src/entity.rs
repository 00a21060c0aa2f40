//! Entity model for extracted entities.
//!
//! An [`Entity`] is an immutable record of a typed substring of the
//! normalized text: canonical type tag, surface value, half-open character
//! span, confidence, producing engine and rule/model version. Engines
//! create entities; the resolver and filters only ever build new ones.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Entity kind
// ============================================================================

/// Canonical entity type tags.
///
/// The wire format is the label string (`EMAIL`, `CODICEFISCALE`, …).
/// Statistical taggers emit CoNLL/spaCy-style labels (`ORG`, `PER`, `LOC`,
/// optionally BIO-prefixed); [`EntityKind::from_label`] folds those onto the
/// canonical tags. Unknown labels are preserved as [`EntityKind::Other`] so
/// lexicon categories and custom model types survive round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EntityKind {
    /// Email address.
    Email,
    /// Italian fiscal code (16-char alphanumeric).
    CodiceFiscale,
    /// Italian VAT number (11 digits, `IT`-prefixed or label-anchored).
    PartitaIva,
    /// International bank account number.
    Iban,
    /// Italian phone number (international, landline or mobile).
    Telefono,
    /// Calendar date.
    Data,
    /// Monetary amount (euro).
    Importo,
    /// Case / practice reference number.
    NumeroPratica,
    /// Organization / company name.
    Azienda,
    /// Person name.
    Persona,
    /// Location / place name.
    Luogo,
    /// Any other label (lexicon categories, custom model types).
    Other(String),
}

impl EntityKind {
    /// Canonical label string for the wire contract.
    #[must_use]
    pub fn as_label(&self) -> &str {
        match self {
            EntityKind::Email => "EMAIL",
            EntityKind::CodiceFiscale => "CODICEFISCALE",
            EntityKind::PartitaIva => "PARTITAIVA",
            EntityKind::Iban => "IBAN",
            EntityKind::Telefono => "TELEFONO",
            EntityKind::Data => "DATA",
            EntityKind::Importo => "IMPORTO",
            EntityKind::NumeroPratica => "NUMERO_PRATICA",
            EntityKind::Azienda => "AZIENDA",
            EntityKind::Persona => "PERSONA",
            EntityKind::Luogo => "LUOGO",
            EntityKind::Other(s) => s.as_str(),
        }
    }

    /// Parse from a label string.
    ///
    /// Strips BIO prefixes (`B-`, `I-`, `E-`, `S-`) and folds common
    /// CoNLL/OntoNotes tags onto the canonical Italian tags. Never fails:
    /// unknown labels become [`EntityKind::Other`] (uppercased).
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label
            .strip_prefix("B-")
            .or_else(|| label.strip_prefix("I-"))
            .or_else(|| label.strip_prefix("E-"))
            .or_else(|| label.strip_prefix("S-"))
            .unwrap_or(label);

        match label.to_uppercase().as_str() {
            "EMAIL" => EntityKind::Email,
            "CODICEFISCALE" | "CODICE_FISCALE" => EntityKind::CodiceFiscale,
            "PARTITAIVA" | "PARTITA_IVA" => EntityKind::PartitaIva,
            "IBAN" => EntityKind::Iban,
            "TELEFONO" | "PHONE" => EntityKind::Telefono,
            "DATA" | "DATE" => EntityKind::Data,
            "IMPORTO" | "MONEY" => EntityKind::Importo,
            "NUMERO_PRATICA" => EntityKind::NumeroPratica,
            "AZIENDA" | "ORG" | "ORGANIZATION" => EntityKind::Azienda,
            "PERSONA" | "PER" | "PERSON" => EntityKind::Persona,
            "LUOGO" | "LOC" | "LOCATION" | "GPE" => EntityKind::Luogo,
            other => EntityKind::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl Serialize for EntityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_label())
    }
}

impl<'de> Deserialize<'de> for EntityKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        if label.trim().is_empty() {
            return Err(D::Error::custom("entity type label must not be empty"));
        }
        Ok(EntityKind::from_label(&label))
    }
}

// ============================================================================
// Source
// ============================================================================

/// Which engine produced an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Curated regex pattern set.
    Regex,
    /// Statistical NER tagger.
    Ner,
    /// Lemma-based dictionary lookup.
    Lexicon,
}

impl Source {
    /// Lowercase name, as serialized.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Source::Regex => "regex",
            Source::Ner => "ner",
            Source::Lexicon => "lexicon",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regex" => Ok(Source::Regex),
            "ner" => Ok(Source::Ner),
            "lexicon" => Ok(Source::Lexicon),
            other => Err(format!("unknown entity source '{other}'")),
        }
    }
}

// ============================================================================
// Span
// ============================================================================

/// Half-open `[start, end)` character offsets into the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset (char index).
    pub start: usize,
    /// Exclusive end offset (char index).
    pub end: usize,
}

impl Span {
    /// Create a span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span length in characters (0 for malformed spans).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True if the span covers no characters.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the two spans share at least one character.
    #[must_use]
    pub const fn overlaps(&self, other: &Span) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A single extracted entity with full provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Canonical entity type tag.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Surface form (possibly canonicalized by the post-filters).
    pub value: String,
    /// Character span in the normalized text.
    pub span: Span,
    /// Confidence score in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Producing engine.
    pub source: Source,
    /// Version of the rule/model that produced this entity
    /// (e.g. `regex-v1.0`, `lexicon-v1.0`, or the NER model name).
    pub version: String,
}

impl Entity {
    /// Create a new entity. Confidence is clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn new(
        kind: EntityKind,
        value: impl Into<String>,
        start: usize,
        end: usize,
        source: Source,
        confidence: f64,
        version: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
            span: Span::new(start, end),
            confidence: confidence.clamp(0.0, 1.0),
            source,
            version: version.into(),
        }
    }

    /// True if the entity may enter the resolver: non-empty, non-whitespace
    /// value and a well-formed span.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.value.trim().is_empty() && self.span.start < self.span.end
    }

    /// True if this entity's span overlaps `other`'s.
    #[must_use]
    pub fn overlaps(&self, other: &Entity) -> bool {
        self.span.overlaps(&other.span)
    }

    /// Span length in characters.
    #[must_use]
    pub fn span_len(&self) -> usize {
        self.span.len()
    }
}
