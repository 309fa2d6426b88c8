//! Webhook and direct describe requests.
//!
//! The delivery service POSTs a JSON array of events: a subscription
//! validation handshake on setup, blob-created notifications afterwards.
//! Direct callers POST `{blobName, sidecar?, cmsText?}` instead. One body,
//! three behaviors, all answered with 200 unless the pipeline itself fails.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use altpipe::AssetMetadata;

/// Delivery-service event literal for the subscription handshake.
pub const VALIDATION_EVENT: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

/// Delivery-service event literal for a newly written blob.
pub const BLOB_CREATED_EVENT: &str = "Microsoft.Storage.BlobCreated";

/// POST /describe
pub async fn describe(
    State(state): State<ServerState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Response> {
    let Json(body) = body.map_err(|err| ServerError::BadRequest(err.to_string()))?;

    match body {
        Value::Array(events) => handle_events(&state, events).await,
        Value::Object(_) => handle_direct(&state, body).await,
        _ => Err(ServerError::BadRequest(
            "body must be an event array or a describe request".to_string(),
        )),
    }
}

/// Walks a delivery-service event batch and answers for the first actionable
/// event: the validation handshake, a skipped non-image, or a processed
/// image.
async fn handle_events(state: &ServerState, events: Vec<Value>) -> ServerResult<Response> {
    // The handshake is always the first element and must complete without
    // side effects.
    if let Some(first) = events.first() {
        if first["eventType"] == VALIDATION_EVENT {
            let code = first["data"]["validationCode"].as_str().ok_or_else(|| {
                ServerError::BadRequest("validation event without validationCode".to_string())
            })?;
            return Ok(Json(json!({ "validationResponse": code })).into_response());
        }
    }

    for event in &events {
        if event["eventType"] != BLOB_CREATED_EVENT {
            continue;
        }
        let url = event["data"]["url"].as_str().ok_or_else(|| {
            ServerError::BadRequest("blob-created event without data.url".to_string())
        })?;
        let (container, blob) = parse_blob_url(url).ok_or_else(|| {
            ServerError::BadRequest(format!("blob URL has no container/blob path: {url}"))
        })?;

        if !altpipe::is_image(&blob) {
            tracing::info!(container = %container, blob = %blob, "skipping non-image blob");
            return Ok(skipped_response(&blob));
        }

        let outcome = state.pipeline.process_blob(&blob, None, None).await?;
        return Ok(processed_response(&blob, outcome));
    }

    // Nothing recognizable; acknowledge so the delivery service stops
    // retrying a payload we will never act on.
    Ok(pending_response())
}

/// Direct request: `{blobName, sidecar?, cmsText?}`.
async fn handle_direct(state: &ServerState, body: Value) -> ServerResult<Response> {
    let Some(blob) = body["blobName"].as_str().map(str::to_string) else {
        return Ok(pending_response());
    };

    if !altpipe::is_image(&blob) {
        return Ok(skipped_response(&blob));
    }

    let metadata: Option<AssetMetadata> = body
        .get("sidecar")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok());
    let cms_text = body["cmsText"].as_str().map(str::to_string);

    let outcome = state.pipeline.process_blob(&blob, metadata, cms_text).await?;
    Ok(processed_response(&blob, outcome))
}

/// Container and blob name from the path of an absolute blob URL: the first
/// segment is the container, the remainder (which may itself contain
/// slashes) is the blob name.
pub fn parse_blob_url(url: &str) -> Option<(String, String)> {
    let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let (_, path) = after_scheme.split_once('/')?;
    let (container, blob) = path.split_once('/')?;
    if container.is_empty() || blob.is_empty() {
        return None;
    }
    Some((container.to_string(), blob.to_string()))
}

fn skipped_response(blob: &str) -> Response {
    Json(json!({
        "status": "skipped",
        "reason": "Not an image file",
        "blob": blob,
    }))
    .into_response()
}

fn processed_response(blob: &str, outcome: altpipe::ProcessOutcome) -> Response {
    Json(json!({
        "status": "processed",
        "blob": blob,
        "altText": outcome.sidecar.alt_text,
        "sidecar": outcome.sidecar_blob,
        "tags": outcome.tags,
    }))
    .into_response()
}

fn pending_response() -> Response {
    (StatusCode::ACCEPTED, Json(json!({ "status": "pending" }))).into_response()
}
