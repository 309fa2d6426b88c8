//! Delivery tracking.
//!
//! The delivery service retries an event up to five times over an hour, and
//! every attempt arrives as a fresh HTTP request. Each request gets a
//! tracking id (reusing `x-request-id` when the caller sent one), and the
//! log lines around the handler carry the delivery envelope headers
//! (`aeg-event-type`, `aeg-delivery-count`) so retry storms for one blob are
//! visible in the logs without correlating bodies.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

/// Tracking id of the current delivery attempt, stored in request
/// extensions for handlers that want to tag their own log lines.
#[derive(Debug, Clone)]
pub struct DeliveryId(pub String);

/// Wraps every request with tracking id assignment and envelope logging.
pub async fn track_delivery(mut request: Request, next: Next) -> Response {
    let delivery_id = header_string(request.headers(), "x-request-id")
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    // Envelope headers are only present on delivery-service webhooks, not on
    // direct describe or login calls.
    let event_kind = header_string(request.headers(), "aeg-event-type");
    let delivery_count = header_string(request.headers(), "aeg-delivery-count");

    request
        .extensions_mut()
        .insert(DeliveryId(delivery_id.clone()));

    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        delivery_id = %delivery_id,
        event_kind = event_kind.as_deref().unwrap_or("direct"),
        attempt = delivery_count.as_deref().unwrap_or("1"),
        "delivery received"
    );

    let mut response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %started.elapsed().as_millis(),
        delivery_id = %delivery_id,
        "delivery answered"
    );

    if let Ok(value) = delivery_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
