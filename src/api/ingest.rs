//! Ingestion, sync, and render-ingest handlers.
//!
//! All three are auth-gated when an ingest token is configured. Ingestion success is
//! independent of sync success: a skipped or failed re-index still reports
//! `success: true` for the stored document.

use crate::api::{AppState, error::ApiError};
use crate::auth::check_bearer;
use crate::storage::IngestionRecord;
use crate::sync::SyncOutcome;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata source tag applied to documents stored via `POST /api/ingest`.
const API_SOURCE_TAG: &str = "api-ingest";
/// Metadata source tag applied to documents stored via `POST /api/render-ingest`.
const RENDER_SOURCE_TAG: &str = "render-ingest";

/// Request body for `POST /api/ingest`.
#[derive(Deserialize)]
pub(crate) struct IngestRequest {
    /// Site path of the document; becomes the storage key.
    path: Option<String>,
    /// Document body.
    content: Option<String>,
    /// Optional caller metadata merged under the system fields.
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
    /// Optional content-type override; wins over extension inference.
    #[serde(default)]
    content_type: Option<String>,
    /// Request a re-index after storing (default true).
    #[serde(default = "default_true")]
    sync: bool,
}

/// Request body for `POST /api/render-ingest`.
#[derive(Deserialize)]
pub(crate) struct RenderIngestRequest {
    /// Remote page to render.
    url: Option<String>,
    /// Optional storage path override; derived from the URL when absent.
    #[serde(default)]
    path: Option<String>,
    /// Optional caller metadata merged under the system fields.
    #[serde(default)]
    metadata: Option<BTreeMap<String, String>>,
    /// Request a re-index after storing (default true).
    #[serde(default = "default_true")]
    sync: bool,
}

/// Success response for both ingestion endpoints.
#[derive(Serialize)]
pub(crate) struct IngestResponse {
    /// Always true; failures surface through the error taxonomy instead.
    success: bool,
    /// Storage key the document landed under.
    path: String,
    /// Sync outcome when a re-index was requested; advisory only.
    #[serde(skip_serializing_if = "Option::is_none")]
    sync: Option<SyncOutcome>,
}

fn default_true() -> bool {
    true
}

/// Store a document blob and optionally trigger a re-index.
pub(crate) async fn ingest_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    check_bearer(&headers, state.config().ingest_token.as_deref())
        .map_err(|()| ApiError::Unauthorized)?;

    let request: IngestRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::InvalidRequest(format!("Malformed JSON body: {err}")))?;

    let path = request
        .path
        .as_deref()
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("`path` is required".to_string()))?;
    let content = request
        .content
        .ok_or_else(|| ApiError::InvalidRequest("`content` is required".to_string()))?;

    let store = state
        .store()
        .ok_or_else(|| ApiError::not_configured("Object store not configured"))?;

    let record = IngestionRecord::build(
        path,
        content,
        request.content_type,
        request.metadata.unwrap_or_default(),
        API_SOURCE_TAG,
    );
    store.put(&record).await?;

    let sync = maybe_sync(&state, request.sync).await;
    Ok(Json(IngestResponse {
        success: true,
        path: record.key,
        sync,
    }))
}

/// Trigger a re-index on demand.
pub(crate) async fn trigger_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SyncOutcome>, ApiError> {
    check_bearer(&headers, state.config().ingest_token.as_deref())
        .map_err(|()| ApiError::Unauthorized)?;
    Ok(Json(state.sync().trigger().await))
}

/// Render a remote page and store the resulting HTML.
pub(crate) async fn render_ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    check_bearer(&headers, state.config().ingest_token.as_deref())
        .map_err(|()| ApiError::Unauthorized)?;

    let request: RenderIngestRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::InvalidRequest(format!("Malformed JSON body: {err}")))?;

    let url = request
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("`url` is required".to_string()))?;

    let render = state
        .render()
        .ok_or_else(|| ApiError::not_configured("Rendering service not configured"))?;
    let store = state
        .store()
        .ok_or_else(|| ApiError::not_configured("Object store not configured"))?;

    let target = render.validate_url(url)?;
    let html = render.render(&target).await?;

    let key = request
        .path
        .as_deref()
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| derive_render_key(&target));

    let mut metadata = request.metadata.unwrap_or_default();
    metadata.insert("rendered_from".to_string(), target.to_string());

    let record = IngestionRecord::build(
        &key,
        html,
        Some("text/html".to_string()),
        metadata,
        RENDER_SOURCE_TAG,
    );
    store.put(&record).await?;

    let sync = maybe_sync(&state, request.sync).await;
    Ok(Json(IngestResponse {
        success: true,
        path: record.key,
        sync,
    }))
}

async fn maybe_sync(state: &AppState, requested: bool) -> Option<SyncOutcome> {
    if !requested {
        return None;
    }
    Some(state.sync().trigger().await)
}

/// Derive a storage key for a rendered page from its URL.
fn derive_render_key(url: &reqwest::Url) -> String {
    let host = url.host_str().unwrap_or("page");
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        format!("rendered/{host}/index.html")
    } else {
        format!("rendered/{host}/{}.html", path.replace('/', "-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_key_derivation_handles_roots_and_nesting() {
        let root = reqwest::Url::parse("https://docs.example.com/").expect("url");
        assert_eq!(derive_render_key(&root), "rendered/docs.example.com/index.html");

        let nested = reqwest::Url::parse("https://docs.example.com/guides/plugins/").expect("url");
        assert_eq!(
            derive_render_key(&nested),
            "rendered/docs.example.com/guides-plugins.html"
        );
    }
}
