//! The three extraction engines: regex, statistical NER, lexicon lookup.

pub mod lexicon;
pub mod ner;
pub mod regex;

pub use self::regex::extract_regex;
pub use lexicon::{extract_lexicon, Gazetteer};
pub use ner::{MockTagger, ModelCache, NerEngine, SkipReason, TaggedSpan, Tagger, TaggerLoader};
