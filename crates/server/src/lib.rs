//! HTTP event handler for the alt-text pipeline.
//!
//! Routes webhook deliveries to the pipeline orchestrator:
//!
//! - `GET /health` - liveness probe
//! - `POST /describe` - delivery-service event batches (including the
//!   subscription validation handshake) and direct describe requests
//! - `POST /login` - short-lived opaque session tokens
//!
//! Each request runs end to end on one worker; there is no queue and no
//! background scheduler. The delivery service owns retries, so the handler
//! answers 500 on any pipeline failure and lets the event come back.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
