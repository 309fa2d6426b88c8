//! Router-level tests: the validation handshake, event dispatch, and error
//! mapping, run against the real router with an in-memory pipeline.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use altpipe::{
    AssetMetadata, Describe, DescribeError, DescribeRequest, Description, ObjectStore, Pipeline,
    StorageError, Translate, TranslateError,
};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use server::{build_router, ServerConfig, ServerState};
use tower::ServiceExt;

#[derive(Default)]
struct MemoryStore {
    blobs: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    calls: AtomicUsize,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn read(&self, container: &str, blob: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(&(container.to_string(), blob.to_string()))
            .cloned())
    }

    async fn write(
        &self,
        container: &str,
        blob: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .unwrap()
            .insert((container.to_string(), blob.to_string()), bytes);
        Ok(())
    }

    async fn set_tags(
        &self,
        _container: &str,
        _blob: &str,
        _tags: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn copy(
        &self,
        src_container: &str,
        src_blob: &str,
        dst_container: &str,
        dst_blob: &str,
    ) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let source = self
            .blobs
            .lock()
            .unwrap()
            .get(&(src_container.to_string(), src_blob.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                container: src_container.to_string(),
                blob: src_blob.to_string(),
            })?;
        self.blobs
            .lock()
            .unwrap()
            .insert((dst_container.to_string(), dst_blob.to_string()), source);
        Ok(())
    }
}

#[derive(Default)]
struct CannedDescriber {
    calls: AtomicUsize,
}

#[async_trait]
impl Describe for CannedDescriber {
    async fn describe(&self, _request: &DescribeRequest) -> Result<Description, DescribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Description {
            content: r#"{"alt_en": "a black printer"}"#.to_string(),
            usage: None,
        })
    }
}

#[derive(Default)]
struct EchoTranslator;

#[async_trait]
impl Translate for EchoTranslator {
    async fn translate_one(
        &self,
        text: &str,
        lang: &str,
        _metadata: &AssetMetadata,
    ) -> Result<String, TranslateError> {
        Ok(format!("[{lang}] {text}"))
    }
}

struct TestHarness {
    app: Router,
    store: Arc<MemoryStore>,
    describer: Arc<CannedDescriber>,
}

impl TestHarness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let describer = Arc::new(CannedDescriber::default());
        let pipeline = Pipeline::with_parts(
            store.clone(),
            describer.clone(),
            Arc::new(EchoTranslator),
            "ingest",
            "public",
            vec!["en".to_string()],
        );
        let app = build_router(ServerState::with_pipeline(ServerConfig::default(), pipeline));
        Self {
            app,
            store,
            describer,
        }
    }

    fn outbound_calls(&self) -> usize {
        self.store.calls.load(Ordering::SeqCst) + self.describer.calls.load(Ordering::SeqCst)
    }
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn validation_handshake_echoes_code_without_side_effects() {
    let harness = TestHarness::new();
    let body = json!([{
        "eventType": "Microsoft.EventGrid.SubscriptionValidationEvent",
        "data": {"validationCode": "ABC-123"}
    }]);

    let response = harness
        .app
        .clone()
        .oneshot(json_request("/describe", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload, json!({"validationResponse": "ABC-123"}));
    assert_eq!(harness.outbound_calls(), 0);
}

#[tokio::test]
async fn non_image_blob_is_skipped_without_calls() {
    let harness = TestHarness::new();
    let body = json!([{
        "eventType": "Microsoft.Storage.BlobCreated",
        "data": {"url": "https://acct.blob.core.windows.net/ingest/notes.txt"}
    }]);

    let response = harness
        .app
        .clone()
        .oneshot(json_request("/describe", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "skipped");
    assert_eq!(payload["reason"], "Not an image file");
    assert_eq!(harness.outbound_calls(), 0);
}

#[tokio::test]
async fn blob_created_event_is_processed() {
    let harness = TestHarness::new();
    harness.store.blobs.lock().unwrap().insert(
        ("ingest".to_string(), "img_0.png".to_string()),
        vec![0x89, 0x50, 0x4e, 0x47],
    );
    let body = json!([{
        "eventType": "Microsoft.Storage.BlobCreated",
        "data": {"url": "https://acct.blob.core.windows.net/ingest/img_0.png"}
    }]);

    let response = harness
        .app
        .clone()
        .oneshot(json_request("/describe", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "processed");
    assert_eq!(payload["blob"], "img_0.png");
    assert_eq!(payload["altText"]["en"], "A black printer.");
    assert_eq!(payload["sidecar"], "img_0.alt.json");

    // Durable effects: sidecar written, image promoted.
    assert!(harness
        .store
        .blobs
        .lock()
        .unwrap()
        .contains_key(&("ingest".to_string(), "img_0.alt.json".to_string())));
    assert!(harness
        .store
        .blobs
        .lock()
        .unwrap()
        .contains_key(&("public".to_string(), "img_0.png".to_string())));
}

#[tokio::test]
async fn processing_failure_maps_to_500() {
    let harness = TestHarness::new();
    // Image blob missing from the store.
    let body = json!([{
        "eventType": "Microsoft.Storage.BlobCreated",
        "data": {"url": "https://acct.blob.core.windows.net/ingest/ghost.png"}
    }]);

    let response = harness
        .app
        .clone()
        .oneshot(json_request("/describe", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json(response).await;
    assert_eq!(payload["error"], "PIPELINE_ERROR");
    assert!(payload["message"].as_str().unwrap().contains("ghost.png"));
}

#[tokio::test]
async fn direct_request_without_blob_name_is_pending() {
    let harness = TestHarness::new();
    let response = harness
        .app
        .clone()
        .oneshot(json_request("/describe", json!({"unrelated": true})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "pending");
}

#[tokio::test]
async fn direct_request_with_blob_name_is_processed() {
    let harness = TestHarness::new();
    harness.store.blobs.lock().unwrap().insert(
        ("ingest".to_string(), "img_1.jpg".to_string()),
        vec![0xff, 0xd8, 0xff],
    );
    let body = json!({
        "blobName": "img_1.jpg",
        "sidecar": {"languages": ["en"], "make": "Epson"},
        "cmsText": "Print: 15 ppm"
    });

    let response = harness
        .app
        .clone()
        .oneshot(json_request("/describe", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "processed");
    assert_eq!(payload["tags"]["langs"], "en");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let harness = TestHarness::new();
    let request = Request::builder()
        .method("POST")
        .uri("/describe")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json(response).await;
    assert_eq!(payload["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn health_and_unknown_route() {
    let harness = TestHarness::new();

    let health = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    // Delivery tracking stamps every response.
    assert!(health.headers().get("x-request-id").is_some());
    let payload = read_json(health).await;
    assert_eq!(payload["status"], "ok");
    assert!(payload["timestamp"].is_i64());

    let missing = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_issues_session_token() {
    let harness = TestHarness::new();
    let response = harness
        .app
        .clone()
        .oneshot(json_request("/login", json!({"tenant_id": "acme"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["tenant_id"], "acme");
    assert_eq!(payload["user_id"], "anonymous");
    assert_eq!(payload["expires_in"], 3600);
    assert!(!payload["session_token"].as_str().unwrap().is_empty());
}
