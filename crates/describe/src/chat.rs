//! Chat-completion describer.
//!
//! Sends the composed instructions and the inline image to a chat-completion
//! deployment. The default mode puts the image into the message as a proper
//! image part; [`ContentMode::TextWithImageUrl`] serves deployments that
//! reject image parts by carrying the reference inside the text instead.

use std::time::Duration;

use async_trait::async_trait;
use identity::{TokenProvider, COGNITIVE_AUDIENCE};
use serde::{Deserialize, Serialize};

use crate::prompt::{system_prompt, user_prompt};
use crate::{Describe, DescribeError, DescribeRequest, Description, TokenUsage};

const API_VERSION: &str = "2024-05-01-preview";
const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(60);

const TEMPERATURE: f64 = 0.3;
const TOP_P: f64 = 0.95;

/// How the image reference travels in the user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Ordered content array: image part first, then the text part.
    Multimodal,
    /// Single text part with the image reference embedded in it.
    TextWithImageUrl,
}

/// Describer backed by a chat-completion deployment.
#[derive(Debug, Clone)]
pub struct ChatDescriber {
    endpoint: String,
    deployment: String,
    max_tokens: u32,
    mode: ContentMode,
    tokens: TokenProvider,
    client: reqwest::Client,
}

impl ChatDescriber {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        max_tokens: u32,
        mode: ContentMode,
        tokens: TokenProvider,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DESCRIBE_TIMEOUT)
            .build()
            .expect("failed to build describer HTTP client");
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            max_tokens,
            mode,
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

    fn build_body(&self, request: &DescribeRequest) -> ChatRequest {
        let instruction = user_prompt(request);
        let user_content = match self.mode {
            ContentMode::Multimodal => MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: request.image_ref.clone(),
                    },
                },
                ContentPart::Text { text: instruction },
            ]),
            ContentMode::TextWithImageUrl => MessageContent::Text(format!(
                "Image URL: {}\n\n{instruction}",
                request.image_ref
            )),
        };
        ChatRequest {
            messages: vec![
                Message {
                    role: "system",
                    content: MessageContent::Text(system_prompt(
                        request.metadata.source.as_deref(),
                    )),
                },
                Message {
                    role: "user",
                    content: user_content,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: self.max_tokens,
            top_p: TOP_P,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[async_trait]
impl Describe for ChatDescriber {
    async fn describe(&self, request: &DescribeRequest) -> Result<Description, DescribeError> {
        let token = self.tokens.get_token(COGNITIVE_AUDIENCE).await?;
        let response = self
            .client
            .post(self.completions_url())
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token)
            .json(&self.build_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            tracing::warn!(
                blob = %request.blob_name,
                deployment = %self.deployment,
                status,
                body = %body,
                "describer call failed"
            );
            return Ok(Description::default());
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                blob = %request.blob_name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "describer token usage"
            );
        }
        Ok(Description {
            content,
            usage: parsed.usage,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<Message>,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    ImageUrl { image_url: ImageUrl },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
