//! Chat-completion translation variant.
//!
//! One chat call per target language. The system prompt pins down the two
//! contracts the dedicated API gives us for free: brand/model tokens survive
//! untranslated, and the answer stays within alt-text length.

use std::time::Duration;

use async_trait::async_trait;
use context::AssetMetadata;
use identity::{TokenProvider, COGNITIVE_AUDIENCE};
use serde::Deserialize;
use serde_json::json;

use crate::{api_language, Translate, TranslateError};

const API_VERSION: &str = "2024-05-01-preview";
const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Translator backed by a chat-completion deployment.
#[derive(Debug, Clone)]
pub struct ChatTranslator {
    endpoint: String,
    deployment: String,
    tokens: TokenProvider,
    client: reqwest::Client,
}

impl ChatTranslator {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        tokens: TokenProvider,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(TRANSLATE_TIMEOUT)
            .build()
            .expect("failed to build translator HTTP client");
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            tokens,
            client,
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint.trim_end_matches('/'),
            self.deployment
        )
    }

    fn system_prompt(target: &str, metadata: &AssetMetadata) -> String {
        let mut prompt = format!(
            "You translate English product alt text into the language with code '{target}'. \
             Preserve brand and model names exactly as written. \
             Answer with the translation only, at most 125 characters, no quotes."
        );
        if let (Some(make), Some(model)) = (&metadata.make, &metadata.model) {
            prompt.push_str(&format!(" The product is the {make} {model}."));
        }
        prompt
    }
}

#[async_trait]
impl Translate for ChatTranslator {
    async fn translate_one(
        &self,
        text: &str,
        lang: &str,
        metadata: &AssetMetadata,
    ) -> Result<String, TranslateError> {
        let token = self.tokens.get_token(COGNITIVE_AUDIENCE).await?;
        let body = json!({
            "messages": [
                {"role": "system", "content": Self::system_prompt(api_language(lang), metadata)},
                {"role": "user", "content": text},
            ],
            "temperature": 0.3,
            "max_tokens": 200,
        });
        let response = self
            .client
            .post(self.completions_url())
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

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

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| strip_quotes(content.trim()).to_string())
            .filter(|content| !content.is_empty())
            .ok_or(TranslateError::Malformed)
    }
}

/// Chat models like to quote their one-line answers; the quotes are not part
/// of the translation.
fn strip_quotes(text: &str) -> &str {
    let stripped = text
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'));
    let stripped = stripped.or_else(|| {
        text.strip_prefix('\u{201c}')
            .and_then(|inner| inner.strip_suffix('\u{201d}'))
    });
    stripped.unwrap_or(text)
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
