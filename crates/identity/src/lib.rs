//! Managed-identity token acquisition with per-audience caching.
//!
//! Tokens come from a platform-provided identity endpoint: the App Service
//! sidecar (advertised through `IDENTITY_ENDPOINT`/`IDENTITY_HEADER`, with the
//! legacy `MSI_ENDPOINT`/`MSI_SECRET` spelling still honored) or, when neither
//! is set, the instance-metadata service at its fixed link-local address.
//!
//! Acquired tokens are cached per audience and never served with less than
//! five minutes of residual lifetime. Tokens are bearer credentials and are
//! only ever logged redacted.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Deserialize;

/// Audience for object-store operations.
pub const STORAGE_AUDIENCE: &str = "https://storage.azure.com";

/// Audience for chat-completion, vision, and translation endpoints.
pub const COGNITIVE_AUDIENCE: &str = "https://cognitiveservices.azure.com/.default";

/// Cached tokens with less residual lifetime than this are refreshed.
const EXPIRY_SKEW: Duration = Duration::from_secs(300);

/// Assumed lifetime when the endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const IMDS_API_VERSION: &str = "2018-02-01";

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(ACQUIRE_TIMEOUT)
        .build()
        .expect("failed to build identity HTTP client")
});

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },
}

/// Where tokens come from on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentitySource {
    /// App Service / Functions sidecar with its secret header.
    AppService { endpoint: String, header: String },
    /// Instance-metadata service at the link-local address.
    Imds,
}

fn discover_source() -> IdentitySource {
    let endpoint = std::env::var("IDENTITY_ENDPOINT")
        .or_else(|_| std::env::var("MSI_ENDPOINT"))
        .ok();
    let header = std::env::var("IDENTITY_HEADER")
        .or_else(|_| std::env::var("MSI_SECRET"))
        .ok();
    match (endpoint, header) {
        (Some(endpoint), Some(header)) => IdentitySource::AppService { endpoint, header },
        _ => IdentitySource::Imds,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// IMDS returns this as a decimal string, App Service as a number.
    expires_in: Option<serde_json::Value>,
}

impl TokenResponse {
    fn lifetime(&self) -> Duration {
        let seconds = match &self.expires_in {
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        seconds.map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs)
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.saturating_duration_since(now) > EXPIRY_SKEW
    }
}

/// Process-wide token provider. Safe for concurrent use; clones share the
/// cache.
#[derive(Debug, Clone, Default)]
pub struct TokenProvider {
    cache: std::sync::Arc<DashMap<u64, CachedToken>>,
    /// User-assigned identity client id, when one is configured.
    client_id: Option<String>,
}

impl TokenProvider {
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            cache: Default::default(),
            client_id,
        }
    }

    /// Returns a bearer token for `audience`, from cache when it still has
    /// more than five minutes of lifetime, freshly acquired otherwise.
    pub async fn get_token(&self, audience: &str) -> Result<String, IdentityError> {
        let resource = canonical_audience(audience);
        let key = audience_key(&resource);

        if let Some(entry) = self.cache.get(&key) {
            if entry.is_fresh(Instant::now()) {
                return Ok(entry.token.clone());
            }
        }

        let response = self.acquire(&resource).await?;
        let token = response.access_token.clone();
        tracing::debug!(
            resource = %resource,
            token = %redact(&token),
            expires_in_secs = response.lifetime().as_secs(),
            "acquired managed identity token"
        );
        self.cache.insert(
            key,
            CachedToken {
                token: token.clone(),
                expires_at: Instant::now() + response.lifetime(),
            },
        );
        Ok(token)
    }

    async fn acquire(&self, resource: &str) -> Result<TokenResponse, IdentityError> {
        let request = match discover_source() {
            IdentitySource::AppService { endpoint, header } => {
                let mut request = HTTP_CLIENT
                    .get(&endpoint)
                    .query(&[("resource", resource), ("api-version", APP_SERVICE_API_VERSION)])
                    .header("X-IDENTITY-HEADER", header)
                    .header("Metadata", "true");
                if let Some(client_id) = &self.client_id {
                    request = request.query(&[("client_id", client_id.as_str())]);
                }
                request
            }
            IdentitySource::Imds => HTTP_CLIENT
                .get(IMDS_TOKEN_URL)
                .query(&[("resource", resource), ("api-version", IMDS_API_VERSION)])
                .header("Metadata", "true"),
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Endpoint {
                status,
                body: truncate(&body, 200),
            });
        }
        Ok(response.json().await?)
    }
}

/// Strips a trailing `/.default` scope suffix and trailing slashes so that
/// scope and resource spellings of one audience share a cache entry.
pub fn canonical_audience(audience: &str) -> String {
    let trimmed = audience.trim();
    let trimmed = trimmed.strip_suffix("/.default").unwrap_or(trimmed);
    trimmed.trim_end_matches('/').to_string()
}

fn audience_key(canonical: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    hasher.finish()
}

/// First and last few characters only; tokens never appear whole in logs.
fn redact(token: &str) -> String {
    if token.len() <= 12 {
        return "***".to_string();
    }
    format!("{}***{}", &token[..4], &token[token.len() - 4..])
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        body.to_string()
    } else {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_string()
    }
}
