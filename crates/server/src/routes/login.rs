//! Session tokens for downstream multi-tenant flows.
//!
//! The token is `base64(json({tenant_id, user_id, issued_at, expires_at}))`,
//! opaque but not signed; downstream services use it as an audit tag only.

use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::error::ServerResult;

const SESSION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /login
///
/// A missing or unreadable body falls back to the anonymous defaults; the
/// token is an audit tag, not a credential.
pub async fn login(body: Result<Json<LoginRequest>, JsonRejection>) -> ServerResult<impl IntoResponse> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let tenant_id = request.tenant_id.unwrap_or_else(|| "default".to_string());
    let user_id = request.user_id.unwrap_or_else(|| "anonymous".to_string());

    let issued_at = chrono::Utc::now().timestamp();
    let claims = json!({
        "tenant_id": tenant_id,
        "user_id": user_id,
        "issued_at": issued_at,
        "expires_at": issued_at + SESSION_LIFETIME_SECS,
    });
    let session_token =
        base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(&claims)?);

    Ok(Json(json!({
        "status": "ok",
        "session_token": session_token,
        "tenant_id": tenant_id,
        "user_id": user_id,
        "expires_in": SESSION_LIFETIME_SECS,
    })))
}
