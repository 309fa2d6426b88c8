//! Blob REST client.
//!
//! One HTTPS call per operation against
//! `https://<account>.blob.core.windows.net/<container>/<blob>`, bearer
//! authentication with the storage audience, no retries at this layer (the
//! delivery service retries the whole event).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use identity::{TokenProvider, STORAGE_AUDIENCE};

use crate::{tags_xml, ObjectStore, StorageError};

const API_VERSION: &str = "2021-08-06";
const STORE_TIMEOUT: Duration = Duration::from_secs(30);
const TAG_TIMEOUT: Duration = Duration::from_secs(15);

/// Object-store client bound to one storage account.
#[derive(Debug, Clone)]
pub struct BlobStore {
    account: String,
    tokens: TokenProvider,
    client: reqwest::Client,
}

impl BlobStore {
    pub fn new(account: impl Into<String>, tokens: TokenProvider) -> Self {
        let client = reqwest::Client::builder()
            .timeout(STORE_TIMEOUT)
            .build()
            .expect("failed to build store HTTP client");
        Self {
            account: account.into(),
            tokens,
            client,
        }
    }

    /// Absolute URL of a blob in this account.
    pub fn blob_url(&self, container: &str, blob: &str) -> String {
        format!(
            "https://{}.blob.core.windows.net/{}/{}",
            self.account, container, blob
        )
    }

    async fn bearer(&self) -> Result<String, StorageError> {
        Ok(self.tokens.get_token(STORAGE_AUDIENCE).await?)
    }

    async fn service_error(
        op: &'static str,
        container: &str,
        blob: &str,
        response: reqwest::Response,
    ) -> StorageError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let body = body.chars().take(200).collect();
        StorageError::Service {
            op,
            container: container.to_string(),
            blob: blob.to_string(),
            status,
            body,
        }
    }
}

#[async_trait]
impl ObjectStore for BlobStore {
    async fn read(&self, container: &str, blob: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self
            .client
            .get(self.blob_url(container, blob))
            .bearer_auth(self.bearer().await?)
            .header("x-ms-version", API_VERSION)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::service_error("read", container, blob, response).await);
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }

    async fn write(
        &self,
        container: &str,
        blob: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .put(self.blob_url(container, blob))
            .bearer_auth(self.bearer().await?)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type)
            .header("Content-Length", bytes.len())
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::service_error("write", container, blob, response).await);
        }
        tracing::debug!(container, blob, "wrote blob");
        Ok(())
    }

    async fn set_tags(
        &self,
        container: &str,
        blob: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        let result = self
            .client
            .put(self.blob_url(container, blob))
            .query(&[("comp", "tags")])
            .timeout(TAG_TIMEOUT)
            .bearer_auth(self.bearer().await?)
            .header("x-ms-version", API_VERSION)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(tags_xml(tags))
            .send()
            .await;

        // Tag failures are non-fatal: the sidecar is the durable output and
        // the whole event is retried on real errors.
        match result {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                let status = response.status().as_u16();
                let body: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(200)
                    .collect();
                tracing::warn!(container, blob, status, body = %body, "tag set failed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(container, blob, error = %err, "tag set failed");
                Ok(())
            }
        }
    }

    async fn copy(
        &self,
        src_container: &str,
        src_blob: &str,
        dst_container: &str,
        dst_blob: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .put(self.blob_url(dst_container, dst_blob))
            .bearer_auth(self.bearer().await?)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-copy-source", self.blob_url(src_container, src_blob))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::service_error("copy", dst_container, dst_blob, response).await);
        }
        tracing::debug!(
            src = %format!("{src_container}/{src_blob}"),
            dst = %format!("{dst_container}/{dst_blob}"),
            "copied blob"
        );
        Ok(())
    }
}
