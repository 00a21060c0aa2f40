//! Pipeline configuration: thresholds, feature flags, blacklists and
//! source priorities.
//!
//! Load order for [`PipelineConfig::from_env`]:
//!   1. Built-in defaults.
//!   2. JSON / YAML config file (if `NER_CONFIG_FILE` is set).
//!   3. Individual `NER_*` environment variable overrides.
//!
//! The config is built once at pipeline entry and is read-only for the
//! duration of a run.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::entity::{EntityKind, Source};
use crate::error::{Error, Result};

/// Layer version stamped into every output envelope. Bump on every
/// significant rule/model change.
pub const LAYER_VERSION: &str = "1.0.0";

/// All runtime-tunable parameters for the extraction pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Confidence assigned to regex hits.
    pub regex_confidence: f64,
    /// Confidence floor for NER hits (model scores are clamped up to it).
    pub ner_confidence: f64,
    /// Confidence assigned to lexicon hits.
    pub lexicon_confidence: f64,

    /// Minimum text length (chars) before the NER engine is invoked.
    pub min_text_length_for_ner: usize,
    /// Hard cap per NER invocation, in seconds.
    pub ner_timeout_seconds: f64,
    /// Hard cap on input text length (chars).
    pub max_text_length: usize,
    /// ISO codes for which the NER engine is considered valid.
    pub supported_ner_languages: Vec<String>,

    /// Source priority, highest first.
    pub source_priority: Vec<Source>,

    /// Master switch for the regex engine.
    pub engine_regex_enabled: bool,
    /// Master switch for the NER engine.
    pub engine_ner_enabled: bool,
    /// Master switch for the lexicon engine.
    pub engine_lexicon_enabled: bool,

    /// Per-type feature flags keyed by label. Unknown types default to
    /// enabled.
    pub entity_types_enabled: BTreeMap<String, bool>,

    /// Entity values (case-insensitive) that must always be discarded.
    pub blacklist_values: Vec<String>,

    /// Identifier passed to the NER adapter; also the version tag on NER
    /// entities.
    pub ner_model_name: String,
    /// Version tag stamped into regex entities.
    pub regex_rule_version: String,
    /// Version tag stamped into lexicon entities.
    pub lexicon_version: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            regex_confidence: 0.95,
            ner_confidence: 0.70,
            lexicon_confidence: 0.90,
            min_text_length_for_ner: 20,
            ner_timeout_seconds: 2.0,
            max_text_length: 100_000,
            supported_ner_languages: vec!["it".to_string(), "en".to_string()],
            source_priority: vec![Source::Regex, Source::Ner, Source::Lexicon],
            engine_regex_enabled: true,
            engine_ner_enabled: true,
            engine_lexicon_enabled: true,
            entity_types_enabled: BTreeMap::new(),
            blacklist_values: Vec::new(),
            ner_model_name: String::new(),
            regex_rule_version: "regex-v1.0".to_string(),
            lexicon_version: "lexicon-v1.0".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Build config from the environment, falling back to defaults.
    ///
    /// Reads an optional JSON/YAML file from `NER_CONFIG_FILE` first, then
    /// applies individual `NER_*` overrides on top. Unknown file keys are
    /// ignored with a warning; unparseable values keep the previous value.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(path) = std::env::var("NER_CONFIG_FILE") {
            if !path.trim().is_empty() {
                match load_config_file(Path::new(&path)) {
                    Ok(map) => {
                        apply_file_map(&mut cfg, &map);
                        log::info!("loaded pipeline config from {path}");
                    }
                    Err(err) => {
                        log::warn!("failed to load config file {path}: {err}");
                    }
                }
            }
        }

        apply_env_overrides(&mut cfg);
        cfg
    }

    /// True if the given entity type is enabled. Unknown types default to
    /// enabled.
    #[must_use]
    pub fn is_entity_type_enabled(&self, kind: &EntityKind) -> bool {
        self.entity_types_enabled
            .get(kind.as_label())
            .copied()
            .unwrap_or(true)
    }

    /// True if `language` is one of the supported NER languages.
    #[must_use]
    pub fn is_language_supported(&self, language: Option<&str>) -> bool {
        match language {
            None => false,
            Some(lang) => {
                let lang = lang.to_lowercase();
                self.supported_ner_languages
                    .iter()
                    .any(|l| l.to_lowercase() == lang)
            }
        }
    }

    /// Rank of a source in the priority order (lower wins). Sources absent
    /// from the list rank last.
    #[must_use]
    pub fn source_rank(&self, source: Source) -> usize {
        self.source_priority
            .iter()
            .position(|s| *s == source)
            .unwrap_or(usize::MAX)
    }
}

// ----------------------------------------------------------------------------
// Config file loading
// ----------------------------------------------------------------------------

fn load_config_file(path: &Path) -> Result<serde_json::Map<String, serde_json::Value>> {
    let raw = std::fs::read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let value: serde_json::Value = if is_yaml {
        serde_yaml::from_str(&raw).map_err(|e| Error::config(e.to_string()))?
    } else {
        serde_json::from_str(&raw)?
    };
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(Error::config("config file root must be a mapping")),
    }
}

fn apply_file_map(cfg: &mut PipelineConfig, map: &serde_json::Map<String, serde_json::Value>) {
    use serde_json::Value;

    for (key, value) in map {
        match key.as_str() {
            "regex_confidence" => apply_f64(&mut cfg.regex_confidence, key, value),
            "ner_confidence" => apply_f64(&mut cfg.ner_confidence, key, value),
            "lexicon_confidence" => apply_f64(&mut cfg.lexicon_confidence, key, value),
            "ner_timeout_seconds" => apply_f64(&mut cfg.ner_timeout_seconds, key, value),
            "min_text_length_for_ner" => apply_usize(&mut cfg.min_text_length_for_ner, key, value),
            "max_text_length" => apply_usize(&mut cfg.max_text_length, key, value),
            "engine_regex_enabled" => apply_bool(&mut cfg.engine_regex_enabled, key, value),
            "engine_ner_enabled" => apply_bool(&mut cfg.engine_ner_enabled, key, value),
            "engine_lexicon_enabled" => apply_bool(&mut cfg.engine_lexicon_enabled, key, value),
            "ner_model_name" => apply_string(&mut cfg.ner_model_name, key, value),
            "regex_rule_version" => apply_string(&mut cfg.regex_rule_version, key, value),
            "lexicon_version" => apply_string(&mut cfg.lexicon_version, key, value),
            "supported_ner_languages" => {
                if let Some(langs) = string_list(value) {
                    cfg.supported_ner_languages =
                        langs.into_iter().map(|l| l.to_lowercase()).collect();
                } else {
                    warn_type(key, "list of strings");
                }
            }
            "blacklist_values" => {
                if let Some(values) = string_list(value) {
                    cfg.blacklist_values = values;
                } else {
                    warn_type(key, "list of strings");
                }
            }
            "source_priority" => {
                if let Some(sources) = string_list(value).and_then(|names| {
                    names
                        .iter()
                        .map(|n| Source::from_str(n).ok())
                        .collect::<Option<Vec<_>>>()
                }) {
                    cfg.source_priority = sources;
                } else {
                    warn_type(key, "list of regex|ner|lexicon");
                }
            }
            "entity_types_enabled" => {
                if let Value::Object(flags) = value {
                    for (label, flag) in flags {
                        if let Value::Bool(b) = flag {
                            cfg.entity_types_enabled.insert(label.to_uppercase(), *b);
                        } else {
                            warn_type(&format!("entity_types_enabled.{label}"), "bool");
                        }
                    }
                } else {
                    warn_type(key, "mapping of label to bool");
                }
            }
            unknown => {
                log::warn!("ignoring unknown config key '{unknown}'");
            }
        }
    }
}

fn apply_f64(slot: &mut f64, key: &str, value: &serde_json::Value) {
    match value.as_f64() {
        Some(v) => *slot = v,
        None => warn_type(key, "number"),
    }
}

fn apply_usize(slot: &mut usize, key: &str, value: &serde_json::Value) {
    match value.as_u64() {
        Some(v) => *slot = v as usize,
        None => warn_type(key, "non-negative integer"),
    }
}

fn apply_bool(slot: &mut bool, key: &str, value: &serde_json::Value) {
    match value.as_bool() {
        Some(v) => *slot = v,
        None => warn_type(key, "bool"),
    }
}

fn apply_string(slot: &mut String, key: &str, value: &serde_json::Value) {
    match value.as_str() {
        Some(v) => *slot = v.to_string(),
        None => warn_type(key, "string"),
    }
}

fn string_list(value: &serde_json::Value) -> Option<Vec<String>> {
    value.as_array().and_then(|items| {
        items
            .iter()
            .map(|v| v.as_str().map(|s| s.trim().to_string()))
            .collect()
    })
}

fn warn_type(key: &str, expected: &str) {
    log::warn!("config key '{key}' ignored: expected {expected}");
}

// ----------------------------------------------------------------------------
// Environment overrides
// ----------------------------------------------------------------------------

fn apply_env_overrides(cfg: &mut PipelineConfig) {
    env_f64("NER_REGEX_CONFIDENCE", &mut cfg.regex_confidence);
    env_f64("NER_NER_CONFIDENCE", &mut cfg.ner_confidence);
    env_f64("NER_LEXICON_CONFIDENCE", &mut cfg.lexicon_confidence);
    env_f64("NER_NER_TIMEOUT_SECONDS", &mut cfg.ner_timeout_seconds);
    env_usize("NER_MIN_TEXT_LENGTH_FOR_NER", &mut cfg.min_text_length_for_ner);
    env_usize("NER_MAX_TEXT_LENGTH", &mut cfg.max_text_length);
    env_bool("NER_ENGINE_REGEX_ENABLED", &mut cfg.engine_regex_enabled);
    env_bool("NER_ENGINE_NER_ENABLED", &mut cfg.engine_ner_enabled);
    env_bool("NER_ENGINE_LEXICON_ENABLED", &mut cfg.engine_lexicon_enabled);

    if let Ok(v) = std::env::var("NER_MODEL_NAME") {
        cfg.ner_model_name = v;
    }
    if let Ok(v) = std::env::var("NER_SUPPORTED_LANGUAGES") {
        cfg.supported_ner_languages = csv_list(&v)
            .into_iter()
            .map(|l| l.to_lowercase())
            .collect();
    }
    if let Ok(v) = std::env::var("NER_BLACKLIST") {
        cfg.blacklist_values = csv_list(&v);
    }
    if let Ok(v) = std::env::var("NER_SOURCE_PRIORITY") {
        let parsed: Vec<Source> = csv_list(&v)
            .iter()
            .filter_map(|name| match Source::from_str(name) {
                Ok(s) => Some(s),
                Err(err) => {
                    log::warn!("NER_SOURCE_PRIORITY: {err}");
                    None
                }
            })
            .collect();
        if !parsed.is_empty() {
            cfg.source_priority = parsed;
        }
    }
}

fn env_f64(key: &str, slot: &mut f64) {
    if let Ok(raw) = std::env::var(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => log::warn!("{key}='{raw}' is not a number; keeping {slot}"),
        }
    }
}

fn env_usize(key: &str, slot: &mut usize) {
    if let Ok(raw) = std::env::var(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => log::warn!("{key}='{raw}' is not an integer; keeping {slot}"),
        }
    }
}

fn env_bool(key: &str, slot: &mut bool) {
    if let Ok(raw) = std::env::var(key) {
        match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => *slot = true,
            "false" | "0" | "no" => *slot = false,
            other => log::warn!("{key}='{other}' is not a bool; keeping {slot}"),
        }
    }
}

fn csv_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Env vars are process-global; serialize the tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "NER_CONFIG_FILE",
            "NER_REGEX_CONFIDENCE",
            "NER_NER_CONFIDENCE",
            "NER_LEXICON_CONFIDENCE",
            "NER_MIN_TEXT_LENGTH_FOR_NER",
            "NER_NER_TIMEOUT_SECONDS",
            "NER_MAX_TEXT_LENGTH",
            "NER_SUPPORTED_LANGUAGES",
            "NER_SOURCE_PRIORITY",
            "NER_ENGINE_REGEX_ENABLED",
            "NER_ENGINE_NER_ENABLED",
            "NER_ENGINE_LEXICON_ENABLED",
            "NER_BLACKLIST",
            "NER_MODEL_NAME",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn defaults_match_contract() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.regex_confidence, 0.95);
        assert_eq!(cfg.ner_confidence, 0.70);
        assert_eq!(cfg.lexicon_confidence, 0.90);
        assert_eq!(cfg.min_text_length_for_ner, 20);
        assert_eq!(cfg.ner_timeout_seconds, 2.0);
        assert_eq!(cfg.max_text_length, 100_000);
        assert_eq!(cfg.supported_ner_languages, vec!["it", "en"]);
        assert_eq!(
            cfg.source_priority,
            vec![Source::Regex, Source::Ner, Source::Lexicon]
        );
        assert!(cfg.engine_regex_enabled);
        assert!(cfg.engine_ner_enabled);
        assert!(cfg.engine_lexicon_enabled);
        assert!(cfg.entity_types_enabled.is_empty());
        assert!(cfg.blacklist_values.is_empty());
        assert_eq!(cfg.regex_rule_version, "regex-v1.0");
    }

    #[test]
    fn unknown_entity_types_default_enabled() {
        let mut cfg = PipelineConfig::default();
        assert!(cfg.is_entity_type_enabled(&EntityKind::Iban));
        cfg.entity_types_enabled.insert("IBAN".to_string(), false);
        assert!(!cfg.is_entity_type_enabled(&EntityKind::Iban));
        assert!(cfg.is_entity_type_enabled(&EntityKind::Email));
    }

    #[test]
    fn language_support_is_case_insensitive_and_null_safe() {
        let cfg = PipelineConfig::default();
        assert!(cfg.is_language_supported(Some("IT")));
        assert!(cfg.is_language_supported(Some("en")));
        assert!(!cfg.is_language_supported(Some("de")));
        assert!(!cfg.is_language_supported(None));
    }

    #[test]
    fn source_rank_follows_priority_order() {
        let cfg = PipelineConfig {
            source_priority: vec![Source::Lexicon, Source::Regex],
            ..Default::default()
        };
        assert_eq!(cfg.source_rank(Source::Lexicon), 0);
        assert_eq!(cfg.source_rank(Source::Regex), 1);
        assert_eq!(cfg.source_rank(Source::Ner), usize::MAX);
    }

    #[test]
    fn env_overrides_apply() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("NER_REGEX_CONFIDENCE", "0.5");
        std::env::set_var("NER_MIN_TEXT_LENGTH_FOR_NER", "5");
        std::env::set_var("NER_ENGINE_NER_ENABLED", "false");
        std::env::set_var("NER_SUPPORTED_LANGUAGES", "It, FR");
        std::env::set_var("NER_SOURCE_PRIORITY", "lexicon,regex,ner");
        std::env::set_var("NER_BLACKLIST", "foo, bar");
        std::env::set_var("NER_MODEL_NAME", "it_core_news_lg");

        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.regex_confidence, 0.5);
        assert_eq!(cfg.min_text_length_for_ner, 5);
        assert!(!cfg.engine_ner_enabled);
        assert_eq!(cfg.supported_ner_languages, vec!["it", "fr"]);
        assert_eq!(
            cfg.source_priority,
            vec![Source::Lexicon, Source::Regex, Source::Ner]
        );
        assert_eq!(cfg.blacklist_values, vec!["foo", "bar"]);
        assert_eq!(cfg.ner_model_name, "it_core_news_lg");
        clear_env();
    }

    #[test]
    fn malformed_env_values_keep_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("NER_REGEX_CONFIDENCE", "not-a-number");
        std::env::set_var("NER_ENGINE_REGEX_ENABLED", "maybe");

        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.regex_confidence, 0.95);
        assert!(cfg.engine_regex_enabled);
        clear_env();
    }

    #[test]
    fn json_config_file_applies_known_keys_and_ignores_unknown() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "ner_confidence": 0.8,
                "blacklist_values": ["spam"],
                "entity_types_enabled": {{"iban": false}},
                "no_such_option": 42
            }}"#
        )
        .unwrap();
        std::env::set_var("NER_CONFIG_FILE", file.path());

        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.ner_confidence, 0.8);
        assert_eq!(cfg.blacklist_values, vec!["spam"]);
        assert_eq!(cfg.entity_types_enabled.get("IBAN"), Some(&false));
        clear_env();
    }

    #[test]
    fn yaml_config_file_is_supported() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "ner_timeout_seconds: 0.5\nsupported_ner_languages:\n  - IT\n"
        )
        .unwrap();
        std::env::set_var("NER_CONFIG_FILE", file.path());

        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.ner_timeout_seconds, 0.5);
        assert_eq!(cfg.supported_ner_languages, vec!["it"]);
        clear_env();
    }

    #[test]
    fn env_overrides_beat_config_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"max_text_length": 50}}"#).unwrap();
        std::env::set_var("NER_CONFIG_FILE", file.path());
        std::env::set_var("NER_MAX_TEXT_LENGTH", "75");

        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg.max_text_length, 75);
        clear_env();
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("NER_CONFIG_FILE", "/no/such/file.json");
        let cfg = PipelineConfig::from_env();
        assert_eq!(cfg, PipelineConfig::default());
        clear_env();
    }
}
