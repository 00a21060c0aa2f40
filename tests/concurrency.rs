//! Concurrent pipeline calls: per-call state is independent, the model
//! cache loads once, and results stay deterministic across threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use estratto::{MockTagger, Pipeline, PipelineConfig, TaggedSpan, Tagger, TaggerLoader};
use serde_json::json;

fn payload(text: &str) -> serde_json::Value {
    json!({
        "id_conversazione": "CONV-PAR",
        "id_messaggio": "MSG-PAR",
        "testo_normalizzato": text,
        "lingua": "it",
        "timestamp": "2026-01-01T00:00:00Z",
        "mittente": "a@b.it",
        "destinatario": "c@d.it"
    })
}

#[test]
fn parallel_runs_share_one_model_load_and_agree() {
    let loads = Arc::new(AtomicUsize::new(0));
    let loads_in_loader = Arc::clone(&loads);
    let loader: TaggerLoader = Arc::new(move |_name: &str| {
        loads_in_loader.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(10));
        let tagger = MockTagger::new().with_spans(vec![TaggedSpan {
            value: "ACME".to_string(),
            label: "ORG".to_string(),
            start: 0,
            end: 4,
            confidence: 0.9,
        }]);
        Ok(Arc::new(tagger) as Arc<dyn Tagger>)
    });

    let config = PipelineConfig {
        ner_model_name: "it_parallel_model".to_string(),
        ..Default::default()
    };
    let pipeline = Arc::new(Pipeline::new(config).with_tagger_loader(loader));
    let text = "ACME chiede il rinnovo, scrivere a mario@example.com";

    let reference = serde_json::to_string(&pipeline.run(&payload(text)).entities).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let text = text.to_string();
            std::thread::spawn(move || {
                serde_json::to_string(&pipeline.run(&payload(&text)).entities).unwrap()
            })
        })
        .collect();

    for handle in handles {
        let serialized = handle.join().unwrap();
        assert_eq!(serialized, reference);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn interleaved_different_messages_do_not_cross_contaminate() {
    let pipeline = Arc::new(Pipeline::new(PipelineConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            std::thread::spawn(move || {
                let text = format!("pratica PRAT-2026000{i} con IBAN IT60X0542811101000000123456");
                let output = pipeline.run(&payload(&text));
                assert_eq!(output.meta.status, "ok");
                let pratica = output
                    .entities
                    .iter()
                    .find(|e| e.kind.as_label() == "NUMERO_PRATICA")
                    .expect("pratica entity");
                assert_eq!(pratica.value, format!("PRAT-2026000{i}"));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
