//! Authenticated object-store access.
//!
//! [`ObjectStore`] is the seam the pipeline orchestrator runs against; the
//! production implementation is [`BlobStore`], which speaks the blob REST
//! dialect with managed-identity bearer tokens. The trait carries provided
//! methods for the two derived reads, inline data-URL construction and YAML
//! metadata retrieval, so fakes only implement the four primitive operations.

pub mod client;

pub use client::BlobStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine;
use context::AssetMetadata;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{op} {container}/{blob} returned {status}: {body}")]
    Service {
        op: &'static str,
        container: String,
        blob: String,
        status: u16,
        body: String,
    },

    #[error("blob not found: {container}/{blob}")]
    NotFound { container: String, blob: String },

    #[error(transparent)]
    Identity(#[from] identity::IdentityError),
}

/// Named-binary-object operations the pipeline needs.
///
/// `read` yields `None` for a missing blob; every other primitive treats a
/// non-2xx answer as an error, except `set_tags` which logs and continues
/// (tags are advisory and the event is retried wholesale on real failures).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn read(&self, container: &str, blob: &str) -> Result<Option<Vec<u8>>, StorageError>;

    async fn write(
        &self,
        container: &str,
        blob: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn set_tags(
        &self,
        container: &str,
        blob: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StorageError>;

    async fn copy(
        &self,
        src_container: &str,
        src_blob: &str,
        dst_container: &str,
        dst_blob: &str,
    ) -> Result<(), StorageError>;

    /// Reads the blob and returns a `data:<mime>;base64,<…>` URL embedding
    /// its bytes, with the mime type detected from the extension.
    async fn data_url(&self, container: &str, blob: &str) -> Result<String, StorageError> {
        let bytes = self
            .read(container, blob)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                container: container.to_string(),
                blob: blob.to_string(),
            })?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(format!("data:{};base64,{}", mime_for(blob), encoded))
    }

    /// Fetches and parses the `<stem>.yml` companion of `image_blob`.
    ///
    /// Absent or malformed documents degrade to `None`; the pipeline then
    /// proceeds with empty metadata.
    async fn read_metadata(&self, container: &str, image_blob: &str) -> Option<AssetMetadata> {
        let metadata_blob = with_extension(image_blob, "yml");
        match self.read(container, &metadata_blob).await {
            Ok(Some(bytes)) => parse_metadata(&bytes, &metadata_blob),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(blob = %metadata_blob, error = %err, "metadata fetch failed");
                None
            }
        }
    }
}

/// Parses a metadata document, tolerating malformed input.
pub fn parse_metadata(bytes: &[u8], blob: &str) -> Option<AssetMetadata> {
    match serde_yaml::from_slice::<AssetMetadata>(bytes) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            tracing::warn!(blob = %blob, error = %err, "metadata document is malformed");
            None
        }
    }
}

/// Image extensions the pipeline processes.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// True when the blob name carries an image extension (case-insensitive).
pub fn is_image(blob: &str) -> bool {
    extension(blob)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Mime type for inline image payloads, by extension.
pub fn mime_for(blob: &str) -> &'static str {
    match extension(blob).map(|ext| ext.to_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Final extension of a blob name, without the dot.
pub fn extension(blob: &str) -> Option<&str> {
    match blob.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Replaces the final extension, or appends one when there is none.
pub fn with_extension(blob: &str, ext: &str) -> String {
    match blob.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{ext}"),
        _ => format!("{blob}.{ext}"),
    }
}

/// Sidecar blob name for an image: `<stem>.alt.json`.
pub fn sidecar_name(image_blob: &str) -> String {
    with_extension(image_blob, "alt.json")
}

/// Serializes a tag set into the store's XML wire shape.
pub fn tags_xml(tags: &BTreeMap<String, String>) -> String {
    let mut body = String::from("<Tags><TagSet>");
    for (key, value) in tags {
        body.push_str("<Tag><Key>");
        body.push_str(&escape_xml(key));
        body.push_str("</Key><Value>");
        body.push_str(&escape_xml(value));
        body.push_str("</Value></Tag>");
    }
    body.push_str("</TagSet></Tags>");
    body
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
