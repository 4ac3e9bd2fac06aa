//! Object store integration for ingested documents.
//!
//! Documents land in an S3-compatible bucket keyed by their site path. Writes are
//! create-or-replace; nothing here ever deletes. Metadata rides along as
//! `x-amz-meta-*` headers with two system-added fields (`source`, `ingested_at`)
//! that always win over caller-supplied keys of the same name.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Errors returned while writing to the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Store responded with an unexpected status code.
    #[error("Unexpected object store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Write surface of the blob store, kept narrow so tests can stub it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob under `key`, replacing any previous content.
    async fn put(&self, record: &IngestionRecord) -> Result<(), StorageError>;
}

/// A document prepared for storage.
#[derive(Debug, Clone)]
pub struct IngestionRecord {
    /// Storage key derived from the caller's path (leading slash stripped).
    pub key: String,
    /// Document body.
    pub content: String,
    /// Effective content type after inference or override.
    pub content_type: String,
    /// Merged caller and system metadata.
    pub metadata: BTreeMap<String, String>,
}

impl IngestionRecord {
    /// Build a record from caller input plus the system-added metadata fields.
    ///
    /// The caller's metadata is merged first; `source` and `ingested_at` are applied
    /// afterwards so the system values win on key conflicts.
    pub fn build(
        path: &str,
        content: String,
        content_type: Option<String>,
        caller_metadata: BTreeMap<String, String>,
        source_tag: &str,
    ) -> Self {
        let key = path.strip_prefix('/').unwrap_or(path).to_string();
        let content_type = content_type.unwrap_or_else(|| infer_content_type(&key).to_string());

        let mut metadata = caller_metadata;
        metadata.insert("source".to_string(), source_tag.to_string());
        metadata.insert("ingested_at".to_string(), current_timestamp_rfc3339());

        Self {
            key,
            content,
            content_type,
            metadata,
        }
    }
}

/// Infer a content type from the storage key's extension.
pub fn infer_content_type(key: &str) -> &'static str {
    if key.ends_with(".html") {
        "text/html"
    } else {
        "text/markdown"
    }
}

/// Current UTC time formatted as RFC 3339.
fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// HTTP client writing blobs to an S3-compatible store.
pub struct ObjectStoreHttp {
    client: Client,
    base_url: String,
    bucket: String,
    token: Option<String>,
}

impl ObjectStoreHttp {
    /// Construct a client for the given store endpoint and bucket.
    pub fn new(
        base_url: String,
        bucket: String,
        token: Option<String>,
    ) -> Result<Self, StorageError> {
        let client = Client::builder().user_agent("ragrelay/0.1").build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            token,
        })
    }
}

#[async_trait]
impl BlobStore for ObjectStoreHttp {
    async fn put(&self, record: &IngestionRecord) -> Result<(), StorageError> {
        let url = format!("{}/{}/{}", self.base_url, self.bucket, record.key);
        let mut request = self
            .client
            .put(url)
            .header("content-type", &record.content_type)
            .body(record.content.clone());
        for (key, value) in &record.metadata {
            request = request.header(format!("x-amz-meta-{key}"), value);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StorageError::UnexpectedStatus { status, body };
            tracing::error!(key = %record.key, error = %error, "Object store write failed");
            return Err(error);
        }

        tracing::info!(key = %record.key, content_type = %record.content_type, "Document stored");
        Ok(())
    }
}
