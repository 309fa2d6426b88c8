//! Image describers.
//!
//! A describer turns an image plus its derived context into the raw text of
//! an English alt-text answer. Implementations differ in the inference
//! surface they call:
//!
//! - [`ChatDescriber`]: chat-completion endpoint, either with a multimodal
//!   content array (image part + text part) or, for deployments without
//!   image-part support, with the image reference carried inside the text
//! - [`VisionDescriber`]: caption-plus-tags image-analysis API, used when no
//!   chat deployment is available
//!
//! Describers return the model's answer verbatim; the pipeline runs the
//! [`normalize`] module over it to obtain the final `alt_en`, so the output
//! contract is enforced in one place across provider variability.

pub mod chat;
pub mod normalize;
pub mod prompt;
pub mod vision;

pub use chat::{ChatDescriber, ContentMode};
pub use vision::VisionDescriber;

use async_trait::async_trait;
use context::{AssetMetadata, ProductFacts, VisionHints};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DescribeError {
    #[error("describer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Identity(#[from] identity::IdentityError),
}

/// Everything a describer gets to look at for one image.
#[derive(Debug, Clone, Default)]
pub struct DescribeRequest {
    /// Blob name, included in the prompt as the image filename.
    pub blob_name: String,
    /// Inline `data:` URL (or absolute URL) of the image bytes.
    pub image_ref: String,
    pub metadata: AssetMetadata,
    pub facts: ProductFacts,
    pub hints: VisionHints,
}

/// Raw describer output: the model's message content plus token accounting
/// when the endpoint reports it. An empty `content` means the call failed
/// in a way the caller should treat as an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Description {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Token counts as reported by chat-completion endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[async_trait]
pub trait Describe: Send + Sync {
    async fn describe(&self, request: &DescribeRequest) -> Result<Description, DescribeError>;
}
