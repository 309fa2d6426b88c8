//! Dedicated translation API variant.

use std::time::Duration;

use async_trait::async_trait;
use context::AssetMetadata;
use identity::{TokenProvider, COGNITIVE_AUDIENCE};
use serde::Deserialize;
use serde_json::json;

use crate::{api_language, Translate, TranslateError};

const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Suffix of custom-subdomain endpoints, which accept managed-identity
/// bearer tokens on a different path layout than the global endpoint.
const CUSTOM_SUBDOMAIN: &str = ".cognitiveservices.azure.com";

/// Translator backed by the dedicated translation endpoint.
#[derive(Debug, Clone)]
pub struct TranslationApi {
    endpoint: String,
    region: Option<String>,
    tokens: TokenProvider,
    client: reqwest::Client,
}

impl TranslationApi {
    pub fn new(
        endpoint: impl Into<String>,
        region: Option<String>,
        tokens: TokenProvider,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(TRANSLATE_TIMEOUT)
            .build()
            .expect("failed to build translator HTTP client");
        Self {
            endpoint: endpoint.into(),
            region,
            tokens,
            client,
        }
    }
}

/// Request URL for one target language; custom-subdomain endpoints route
/// through `/translator/text/v3.0`, the global endpoint through
/// `/translate?api-version=3.0`.
pub fn translate_url(endpoint: &str, api_code: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.contains(CUSTOM_SUBDOMAIN) {
        format!("{endpoint}/translator/text/v3.0/translate?from=en&to={api_code}")
    } else {
        format!("{endpoint}/translate?api-version=3.0&from=en&to={api_code}")
    }
}

#[async_trait]
impl Translate for TranslationApi {
    async fn translate_one(
        &self,
        text: &str,
        lang: &str,
        _metadata: &AssetMetadata,
    ) -> Result<String, TranslateError> {
        let token = self.tokens.get_token(COGNITIVE_AUDIENCE).await?;
        let mut request = self
            .client
            .post(translate_url(&self.endpoint, api_language(lang)))
            .bearer_auth(token)
            .json(&json!([{ "text": text }]));
        if let Some(region) = &self.region {
            request = request.header("Ocp-Apim-Subscription-Region", region);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(TranslateError::Service { status, body });
        }

        let results: Vec<TranslationResult> = response.json().await?;
        results
            .into_iter()
            .next()
            .and_then(|result| result.translations.into_iter().next())
            .map(|translation| translation.text)
            .ok_or(TranslateError::Malformed)
    }
}

#[derive(Debug, Deserialize)]
struct TranslationResult {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}
