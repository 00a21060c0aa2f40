//! End-to-end pipeline scenarios over realistic triage payloads.

use std::sync::Arc;

use estratto::{
    run_pipeline, EntityKind, Gazetteer, MockTagger, Pipeline, PipelineConfig, Source, TaggedSpan,
    Tagger, TaggerLoader,
};
use serde_json::{json, Value};

fn payload(text: &str, lingua: Value) -> Value {
    json!({
        "id_conversazione": "CONV-E2E",
        "id_messaggio": "MSG-E2E",
        "testo_normalizzato": text,
        "lingua": lingua,
        "timestamp": "2026-02-03T10:00:00Z",
        "mittente": "cliente@example.it",
        "destinatario": "assistenza@example.it"
    })
}

fn find<'a>(
    output: &'a estratto::ExtractionOutput,
    kind: &EntityKind,
) -> Option<&'a estratto::Entity> {
    output.entities.iter().find(|e| &e.kind == kind)
}

#[test]
fn email_and_prefixed_partita_iva_extracted() {
    let text = "Contatto: mario.rossi@example.com, P.IVA IT12345678901";
    let output = run_pipeline(&payload(text, json!("it")), None);

    assert_eq!(output.meta.status, "ok");
    let email = find(&output, &EntityKind::Email).expect("EMAIL entity");
    assert_eq!(email.value, "mario.rossi@example.com");
    let piva = find(&output, &EntityKind::PartitaIva).expect("PARTITAIVA entity");
    assert_eq!(piva.value, "IT12345678901");
}

#[test]
fn bare_eleven_digit_run_is_not_a_partita_iva() {
    let output = run_pipeline(&payload("Numero cliente 12345678901", json!("it")), None);
    assert_eq!(output.meta.status, "ok");
    assert!(find(&output, &EntityKind::PartitaIva).is_none());
}

#[test]
fn dates_and_amounts_are_canonicalized() {
    let text = "Scadenza 03/02/2026, importo € 1.234,56";
    let output = run_pipeline(&payload(text, json!("it")), None);

    assert_eq!(output.meta.status, "ok");
    let data = find(&output, &EntityKind::Data).expect("DATA entity");
    assert_eq!(data.value, "2026-02-03");
    let importo = find(&output, &EntityKind::Importo).expect("IMPORTO entity");
    assert_eq!(importo.value, "1234.56");
}

#[test]
fn canonicalized_span_still_points_at_original_substring() {
    let text = "Scadenza 03/02/2026 vicina";
    let output = run_pipeline(&payload(text, json!("it")), None);
    let data = find(&output, &EntityKind::Data).unwrap();
    let chars: Vec<char> = text.chars().collect();
    let original: String = chars[data.span.start..data.span.end].iter().collect();
    assert_eq!(original, "03/02/2026");
    assert_eq!(data.value, "2026-02-03");
}

#[test]
fn empty_text_fails_with_errors_and_no_entities() {
    for text in ["", "   \n\t  "] {
        let output = run_pipeline(&payload(text, json!("it")), None);
        assert_eq!(output.meta.status, "failed");
        assert!(!output.errors.is_empty());
        assert!(output.entities.is_empty());
    }
}

#[test]
fn null_lingua_still_extracts_regex_entities_with_fallback() {
    let output = run_pipeline(
        &payload("Scrivimi a mario.rossi@example.com appena puoi", Value::Null),
        None,
    );
    assert_eq!(output.meta.status, "ok");
    assert!(find(&output, &EntityKind::Email).is_some());
    assert!(output
        .meta
        .fallbacks
        .contains(&"language_unknown".to_string()));
}

#[test]
fn lexicon_labels_by_entity_class_not_lemma() {
    let gazetteer = Gazetteer::from_pairs([("ACME", EntityKind::Azienda)]);
    let pipeline = Pipeline::new(PipelineConfig::default()).with_gazetteer(gazetteer);
    let output = pipeline.run(&payload("Sollecito fattura da ACME in oggetto", json!("it")));

    assert_eq!(output.meta.status, "ok");
    let azienda = find(&output, &EntityKind::Azienda).expect("AZIENDA entity");
    assert_eq!(azienda.value, "ACME");
    assert_eq!(azienda.kind.as_label(), "AZIENDA");
    assert_eq!(azienda.source, Source::Lexicon);
}

#[test]
fn ner_adapter_failure_keeps_regex_and_lexicon_results() {
    let loader: TaggerLoader = Arc::new(|_name: &str| {
        Ok(Arc::new(MockTagger::new().failing("modello corrotto")) as Arc<dyn Tagger>)
    });
    let gazetteer = Gazetteer::from_pairs([("ACME", EntityKind::Azienda)]);
    let pipeline = Pipeline::new(PipelineConfig::default())
        .with_gazetteer(gazetteer)
        .with_tagger_loader(loader);

    let output = pipeline.run(&payload(
        "ACME segnala la mail mario.rossi@example.com come urgente",
        json!("it"),
    ));

    assert_eq!(output.meta.status, "ok");
    assert!(output
        .meta
        .fallbacks
        .iter()
        .any(|f| f.starts_with("ner_error:")));
    assert!(find(&output, &EntityKind::Email).is_some());
    assert!(find(&output, &EntityKind::Azienda).is_some());
}

#[test]
fn over_length_text_fails_with_text_too_long() {
    let config = PipelineConfig {
        max_text_length: 50,
        ..Default::default()
    };
    let long_text = "a ".repeat(60);
    let output = run_pipeline(&payload(&long_text, json!("it")), Some(config));
    assert_eq!(output.meta.status, "failed");
    assert!(output.errors.iter().any(|e| e.kind == "text_too_long"));
    assert!(output.entities.is_empty());
}

#[test]
fn ner_entities_flow_through_resolver_and_envelope() {
    let tagger = MockTagger::new().with_spans(vec![TaggedSpan {
        value: "Rossi Costruzioni".to_string(),
        label: "ORG".to_string(),
        start: 21,
        end: 38,
        confidence: 0.35,
    }]);
    let loader: TaggerLoader =
        Arc::new(move |_name: &str| Ok(Arc::new(tagger.clone()) as Arc<dyn Tagger>));
    let config = PipelineConfig {
        ner_model_name: "it_core_news_lg".to_string(),
        ..Default::default()
    };
    let pipeline = Pipeline::new(config).with_tagger_loader(loader);

    let text = "Preventivo inviato a Rossi Costruzioni ieri mattina";
    let output = pipeline.run(&payload(text, json!("it")));

    assert_eq!(output.meta.status, "ok");
    let org = find(&output, &EntityKind::Azienda).expect("AZIENDA from NER");
    assert_eq!(org.source, Source::Ner);
    assert_eq!(org.version, "it_core_news_lg");
    // 0.35 clamped up to the default 0.70 floor
    assert_eq!(org.confidence, 0.70);
    assert!(output.meta.fallbacks.is_empty());
}

#[test]
fn regex_beats_ner_on_same_typed_overlap() {
    let tagger = MockTagger::new().with_spans(vec![TaggedSpan {
        value: "mario.rossi@example.com".to_string(),
        label: "EMAIL".to_string(),
        start: 10,
        end: 33,
        confidence: 0.99,
    }]);
    let loader: TaggerLoader =
        Arc::new(move |_name: &str| Ok(Arc::new(tagger.clone()) as Arc<dyn Tagger>));
    let pipeline = Pipeline::new(PipelineConfig::default()).with_tagger_loader(loader);

    let text = "Contatto: mario.rossi@example.com subito";
    let output = pipeline.run(&payload(text, json!("it")));

    let emails: Vec<_> = output
        .entities
        .iter()
        .filter(|e| e.kind == EntityKind::Email)
        .collect();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].source, Source::Regex);
}

#[test]
fn blacklist_suppresses_entities_end_to_end() {
    let config = PipelineConfig {
        blacklist_values: vec!["noreply@example.com".to_string()],
        ..Default::default()
    };
    let text = "Da NOREPLY@example.com e mario.rossi@example.com";
    let output = run_pipeline(&payload(text, json!("it")), Some(config));
    let emails: Vec<_> = output
        .entities
        .iter()
        .filter(|e| e.kind == EntityKind::Email)
        .collect();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].value, "mario.rossi@example.com");
}

#[test]
fn disabled_entity_type_absent_from_output() {
    let mut config = PipelineConfig::default();
    config
        .entity_types_enabled
        .insert("EMAIL".to_string(), false);
    let text = "mario.rossi@example.com e PRAT-20260001";
    let output = run_pipeline(&payload(text, json!("it")), Some(config));
    assert!(find(&output, &EntityKind::Email).is_none());
    assert!(find(&output, &EntityKind::NumeroPratica).is_some());
}

#[test]
fn envelope_json_has_contractual_fields() {
    let output = run_pipeline(
        &payload("Telefono +39 0212345678, IBAN IT60X0542811101000000123456", json!("it")),
        None,
    );
    let parsed: Value = serde_json::from_str(&output.to_json()).unwrap();
    assert!(parsed["entities"].is_array());
    assert_eq!(parsed["meta"]["layer_version"], "1.0.0");
    assert!(parsed["meta"]["feature_flags"].is_object());
    assert!(parsed["meta"]["component_timings_ms"].is_object());
    assert!(parsed["meta"]["fallbacks"].is_array());
    assert!(parsed["errors"].is_array());
    for entity in parsed["entities"].as_array().unwrap() {
        assert!(entity["type"].is_string());
        assert!(entity["value"].is_string());
        assert!(entity["span"]["start"].is_number());
        assert!(entity["span"]["end"].is_number());
        assert!(entity["confidence"].is_number());
        assert!(entity["source"].is_string());
        assert!(entity["version"].is_string());
    }
}

#[test]
fn spans_index_the_normalized_text_after_whitespace_collapse() {
    // Double spaces collapse during normalization, shifting offsets.
    let text = "Contatto:   mario.rossi@example.com";
    let output = run_pipeline(&payload(text, json!("it")), None);
    let email = find(&output, &EntityKind::Email).unwrap();
    let (normalized, _) = estratto::normalize(text);
    let chars: Vec<char> = normalized.chars().collect();
    let sub: String = chars[email.span.start..email.span.end].iter().collect();
    assert_eq!(sub, "mario.rossi@example.com");
}

#[test]
fn mixed_message_full_triage() {
    let gazetteer = Gazetteer::from_pairs([("ACME S.p.A.", EntityKind::Azienda)]);
    let pipeline = Pipeline::new(PipelineConfig::default()).with_gazetteer(gazetteer);
    let text = "Buongiorno, sono Mario Rossi (CF RSSMRA85M01H501Z) di ACME S.p.A., \
                P.IVA IT12345678901. Pratica PRAT-20260001: bonifico di € 2.500,00 \
                su IT60X0542811101000000123456 entro il 28/02/2026. \
                Telefono 02 12345678, email mario.rossi@acme.example.";
    let output = pipeline.run(&payload(text, json!("it")));

    assert_eq!(output.meta.status, "ok");
    assert!(find(&output, &EntityKind::CodiceFiscale).is_some());
    assert!(find(&output, &EntityKind::PartitaIva).is_some());
    assert!(find(&output, &EntityKind::Azienda).is_some());
    assert!(find(&output, &EntityKind::NumeroPratica).is_some());
    assert!(find(&output, &EntityKind::Importo).is_some());
    assert!(find(&output, &EntityKind::Iban).is_some());
    assert!(find(&output, &EntityKind::Data).is_some());
    assert!(find(&output, &EntityKind::Telefono).is_some());
    assert!(find(&output, &EntityKind::Email).is_some());

    let cf = find(&output, &EntityKind::CodiceFiscale).unwrap();
    assert_eq!(cf.value, "RSSMRA85M01H501Z");
    let importo = find(&output, &EntityKind::Importo).unwrap();
    assert_eq!(importo.value, "2500.00");
    let data = find(&output, &EntityKind::Data).unwrap();
    assert_eq!(data.value, "2026-02-28");
}
