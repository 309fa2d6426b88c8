//! Caption-plus-tags describer.
//!
//! Fallback for deployments without a chat surface: two sequential calls to
//! the image-analysis API (caption, then tags), composed into a short alt
//! string of the form `<brand> <model> <caption>`, truncated to 125
//! characters. Coarser output than the chat variants, but it keeps the
//! pipeline alive when no chat deployment is available.

use std::time::Duration;

use async_trait::async_trait;
use identity::{TokenProvider, COGNITIVE_AUDIENCE};
use serde::Deserialize;
use serde_json::json;

use crate::{Describe, DescribeError, DescribeRequest, Description};

const API_VERSION: &str = "2023-10-01";
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(60);

/// Composed alt strings longer than this are cut with an ellipsis.
const MAX_ALT_CHARS: usize = 125;

/// Describer backed by the image-analysis caption/tags API.
#[derive(Debug, Clone)]
pub struct VisionDescriber {
    endpoint: String,
    tokens: TokenProvider,
    client: reqwest::Client,
}

impl VisionDescriber {
    pub fn new(endpoint: impl Into<String>, tokens: TokenProvider) -> Self {
        let client = reqwest::Client::builder()
            .timeout(ANALYZE_TIMEOUT)
            .build()
            .expect("failed to build vision HTTP client");
        Self {
            endpoint: endpoint.into(),
            tokens,
            client,
        }
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/computervision/imageanalysis:analyze",
            self.endpoint.trim_end_matches('/')
        )
    }

    async fn analyze(
        &self,
        image_ref: &str,
        features: &str,
    ) -> Result<Option<AnalyzeResponse>, DescribeError> {
        let token = self.tokens.get_token(COGNITIVE_AUDIENCE).await?;
        let response = self
            .client
            .post(self.analyze_url())
            .query(&[("api-version", API_VERSION), ("features", features)])
            .bearer_auth(token)
            .json(&json!({ "url": image_ref }))
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
            tracing::warn!(features, status, body = %body, "vision analyze call failed");
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl Describe for VisionDescriber {
    async fn describe(&self, request: &DescribeRequest) -> Result<Description, DescribeError> {
        let Some(caption_response) = self.analyze(&request.image_ref, "caption").await? else {
            return Ok(Description::default());
        };
        let caption = caption_response
            .caption_result
            .map(|caption| caption.text)
            .unwrap_or_default();
        if caption.is_empty() {
            return Ok(Description::default());
        }

        // Tags are advisory; a failed tags call does not sink the caption.
        let tags = match self.analyze(&request.image_ref, "tags").await? {
            Some(response) => response
                .tags_result
                .map(|tags| {
                    tags.values
                        .into_iter()
                        .map(|tag| tag.name)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
            None => Vec::new(),
        };
        if !tags.is_empty() {
            tracing::debug!(blob = %request.blob_name, tags = %tags.join(","), "vision tags");
        }

        Ok(Description {
            content: compose_alt(
                request.metadata.make.as_deref(),
                request.metadata.model.as_deref(),
                &caption,
            ),
            usage: None,
        })
    }
}

/// `<brand> <model> <caption>` with absent parts skipped, cut at 125 chars.
fn compose_alt(make: Option<&str>, model: Option<&str>, caption: &str) -> String {
    let alt = [make.unwrap_or(""), model.unwrap_or(""), caption]
        .iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    if alt.chars().count() <= MAX_ALT_CHARS {
        return alt;
    }
    let mut cut: String = alt.chars().take(MAX_ALT_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(rename = "captionResult")]
    caption_result: Option<CaptionResult>,
    #[serde(rename = "tagsResult")]
    tags_result: Option<TagsResult>,
}

#[derive(Debug, Deserialize)]
struct CaptionResult {
    text: String,
}

#[derive(Debug, Deserialize)]
struct TagsResult {
    #[serde(default)]
    values: Vec<TagValue>,
}

#[derive(Debug, Deserialize)]
struct TagValue {
    name: String,
}
