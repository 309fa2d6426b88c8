//! End-to-end pipeline runs over in-memory fakes.
//!
//! These cover the seeded scenarios: the happy path with a metadata
//! document, multi-language translation with an alias code, normalizer
//! behavior behind a prose-speaking describer, per-language translation
//! fallback, and idempotent reprocessing.

mod common;

use std::sync::Arc;

use altpipe::{AltTextSidecar, AssetMetadata, Pipeline, PipelineError};
use common::{MemoryStore, ScriptedDescriber, ScriptedTranslator};

const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

fn pipeline(
    store: Arc<MemoryStore>,
    describer: Arc<ScriptedDescriber>,
    translator: Arc<ScriptedTranslator>,
) -> Pipeline {
    Pipeline::with_parts(
        store,
        describer,
        translator,
        "ingest",
        "public",
        vec!["en".to_string()],
    )
}

fn parse_sidecar(store: &MemoryStore, blob: &str) -> AltTextSidecar {
    let bytes = store
        .get("ingest", blob)
        .unwrap_or_else(|| panic!("sidecar {blob} was not written"));
    serde_json::from_slice(&bytes).expect("sidecar is valid JSON")
}

#[tokio::test]
async fn happy_path_single_language() {
    let store = Arc::new(MemoryStore::new());
    store.seed("ingest", "img_0.png", PNG_BYTES);
    store.seed(
        "ingest",
        "img_0.yml",
        b"source: public website\n\
          languages: [EN]\n\
          make: Epson\n\
          model: EcoTank L3560\n\
          description: |\n\
          \x20 Print: 15 ppm\n\
          \x20 Free support included\n",
    );
    let describer = Arc::new(ScriptedDescriber::replying(
        "**Result:**\nEpson EcoTank L3560 ink tank printer",
    ));
    let translator = Arc::new(ScriptedTranslator::default());

    let outcome = pipeline(store.clone(), describer.clone(), translator)
        .process_blob("img_0.png", None, None)
        .await
        .expect("pipeline run succeeds");

    // Sidecar written next to the image, normalized English alt.
    let sidecar = parse_sidecar(&store, "img_0.alt.json");
    assert_eq!(
        sidecar.alt_text["en"],
        "Epson EcoTank L3560 ink tank printer."
    );
    assert_eq!(sidecar.image, "img_0.png");
    assert_eq!(sidecar.source, "public website");
    assert_eq!(sidecar.alt_text.len(), 1);
    assert_eq!(outcome.sidecar_blob, "img_0.alt.json");

    // Tag set on the image.
    let tags = store.tags_for("ingest", "img_0.png").expect("tags set");
    assert_eq!(tags["processed"], "true");
    assert_eq!(tags["alt.v"], "1");
    assert_eq!(tags["langs"], "en");

    // Image promoted to the public area, bytes intact.
    assert_eq!(store.get("public", "img_0.png").as_deref(), Some(PNG_BYTES));

    // The describer saw the distilled facts, not the promotional line.
    let request = describer.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.facts.get("print").map(String::as_str), Some("15 ppm"));
    assert!(!request
        .facts
        .values()
        .any(|value| value.contains("support")));
    assert_eq!(request.metadata.make.as_deref(), Some("Epson"));
}

#[tokio::test]
async fn multi_language_with_alias_code() {
    let store = Arc::new(MemoryStore::new());
    store.seed("ingest", "img_1.png", PNG_BYTES);
    let describer = Arc::new(ScriptedDescriber::replying(r#"{"alt_en":"A printer."}"#));
    let translator = Arc::new(ScriptedTranslator::with_translations(&[
        ("ja", "プリンタ。"),
        ("nl", "Een printer."),
    ]));

    let metadata = AssetMetadata {
        asset: Some("a-1".into()),
        languages: vec!["EN".into(), "JP".into(), "NL".into()],
        ..Default::default()
    };
    pipeline(store.clone(), describer, translator)
        .process_blob("img_1.png", Some(metadata), None)
        .await
        .expect("pipeline run succeeds");

    let sidecar = parse_sidecar(&store, "img_1.alt.json");
    let keys: Vec<&str> = sidecar.alt_text.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["en", "jp", "nl"]);
    assert_eq!(sidecar.alt_text["en"], "A printer.");
    assert_eq!(sidecar.alt_text["jp"], "プリンタ。");
    assert_eq!(sidecar.alt_text["nl"], "Een printer.");
    assert_eq!(sidecar.asset, "a-1");

    let tags = store.tags_for("ingest", "img_1.png").unwrap();
    assert_eq!(tags["langs"], "en,jp,nl");
}

#[tokio::test]
async fn translator_partial_failure_keeps_english_for_that_language() {
    let store = Arc::new(MemoryStore::new());
    store.seed("ingest", "img_2.png", PNG_BYTES);
    let describer = Arc::new(ScriptedDescriber::replying(r#"{"alt_en":"A printer."}"#));
    let translator = Arc::new(
        ScriptedTranslator::with_translations(&[("fr", "Une imprimante.")]).failing_on("de"),
    );

    let metadata = AssetMetadata {
        languages: vec!["fr".into(), "de".into()],
        ..Default::default()
    };
    pipeline(store.clone(), describer, translator)
        .process_blob("img_2.png", Some(metadata), None)
        .await
        .expect("one failed language must not fail the run");

    let sidecar = parse_sidecar(&store, "img_2.alt.json");
    assert_eq!(sidecar.alt_text["fr"], "Une imprimante.");
    assert_eq!(sidecar.alt_text["de"], "A printer.");
    assert_eq!(sidecar.alt_text["en"], "A printer.");
}

#[tokio::test]
async fn missing_metadata_defaults_to_english_only() {
    let store = Arc::new(MemoryStore::new());
    store.seed("ingest", "img_3.png", PNG_BYTES);
    let describer = Arc::new(ScriptedDescriber::replying(r#"{"alt_en":"a scanner"}"#));
    let translator = Arc::new(ScriptedTranslator::default());

    pipeline(store.clone(), describer, translator)
        .process_blob("img_3.png", None, None)
        .await
        .expect("pipeline runs without metadata");

    let sidecar = parse_sidecar(&store, "img_3.alt.json");
    assert_eq!(sidecar.alt_text["en"], "A scanner.");
    assert_eq!(sidecar.alt_text.len(), 1);
    assert_eq!(sidecar.source, "");
    assert_eq!(sidecar.asset, "img_3");
}

#[tokio::test]
async fn fenced_json_reply_is_normalized() {
    let store = Arc::new(MemoryStore::new());
    store.seed("ingest", "img_4.png", PNG_BYTES);
    let describer = Arc::new(ScriptedDescriber::replying(
        "```json\n{\"alt_en\":\"front view of camera\"}\n```",
    ));
    let translator = Arc::new(ScriptedTranslator::default());

    pipeline(store.clone(), describer, translator)
        .process_blob("img_4.png", None, None)
        .await
        .expect("pipeline run succeeds");

    let sidecar = parse_sidecar(&store, "img_4.alt.json");
    assert_eq!(sidecar.alt_text["en"], "Front view of camera.");
}

#[tokio::test]
async fn empty_describer_reply_aborts_the_run() {
    let store = Arc::new(MemoryStore::new());
    store.seed("ingest", "img_5.png", PNG_BYTES);
    let describer = Arc::new(ScriptedDescriber::replying(""));
    let translator = Arc::new(ScriptedTranslator::default());

    let err = pipeline(store.clone(), describer, translator)
        .process_blob("img_5.png", None, None)
        .await
        .expect_err("empty alt text is an error");
    assert!(matches!(err, PipelineError::EmptyAltText { .. }));

    // Nothing persisted.
    assert!(store.get("ingest", "img_5.alt.json").is_none());
    assert!(store.get("public", "img_5.png").is_none());
}

#[tokio::test]
async fn missing_image_blob_aborts_the_run() {
    let store = Arc::new(MemoryStore::new());
    let describer = Arc::new(ScriptedDescriber::replying(r#"{"alt_en":"a printer"}"#));
    let translator = Arc::new(ScriptedTranslator::default());

    let err = pipeline(store, describer, translator)
        .process_blob("ghost.png", None, None)
        .await
        .expect_err("missing blob is an error");
    assert!(matches!(err, PipelineError::Storage(_)));
}

#[tokio::test]
async fn reprocessing_is_idempotent_up_to_timestamp() {
    let store = Arc::new(MemoryStore::new());
    store.seed("ingest", "img_6.png", PNG_BYTES);
    let describer = Arc::new(ScriptedDescriber::replying(r#"{"alt_en":"A printer."}"#));
    let translator = Arc::new(ScriptedTranslator::with_translations(&[("ja", "プリンタ。")]));
    let metadata = AssetMetadata {
        languages: vec!["en".into(), "jp".into()],
        ..Default::default()
    };

    let pipeline = pipeline(store.clone(), describer, translator);
    pipeline
        .process_blob("img_6.png", Some(metadata.clone()), None)
        .await
        .unwrap();
    let first = parse_sidecar(&store, "img_6.alt.json");
    let first_tags = store.tags_for("ingest", "img_6.png").unwrap();

    pipeline
        .process_blob("img_6.png", Some(metadata), None)
        .await
        .unwrap();
    let second = parse_sidecar(&store, "img_6.alt.json");
    let second_tags = store.tags_for("ingest", "img_6.png").unwrap();

    assert_eq!(first.alt_text, second.alt_text);
    assert_eq!(first.asset, second.asset);
    assert_eq!(first.image, second.image);
    assert_eq!(first.source, second.source);
    assert_eq!(first_tags, second_tags);
}
