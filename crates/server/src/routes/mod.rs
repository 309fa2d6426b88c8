//! API route handlers
//!
//! - `health`: liveness probe
//! - `describe`: delivery-service webhook and direct describe requests
//! - `login`: short-lived opaque session tokens for downstream flows

pub mod describe;
pub mod health;
pub mod login;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Service info, root endpoint (GET /).
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "altpipe",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/describe", "/login"],
    })))
}

/// 404 handler for undefined routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
