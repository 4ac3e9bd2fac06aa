//! Retrieval backend abstraction.
//!
//! The managed retrieval service can be reached two ways: a direct in-process binding
//! (an embedder-supplied [`RetrievalBackend`] implementation) or the REST fallback
//! client in [`rest`]. The dispatcher prefers the binding when one was injected and
//! otherwise falls back to REST; both speak the same query contract.

mod rest;

pub use rest::RestRetrieval;

use crate::search::SearchInvocation;
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// Open byte stream forwarded to the client without buffering.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, Box<dyn std::error::Error + Send + Sync>>> + Send>>;

/// Errors returned while talking to the retrieval backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid retrieval API URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend responded with an unexpected status code.
    #[error("Unexpected retrieval response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// One matching document returned by the retrieval backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Path of the indexed document the match came from.
    pub filename: String,
    /// Relevance score in `[0, 1]`.
    pub score: f64,
    /// Matching text fragments, in backend order.
    #[serde(default)]
    pub content: Vec<ContentFragment>,
}

/// A single text snippet within a matching document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFragment {
    /// Snippet text.
    pub text: String,
}

/// Result of a retrieval-only (`search`) call: documents, no generated answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrievalResult {
    /// Matching documents ordered by relevance.
    #[serde(default)]
    pub data: Vec<SourceDocument>,
}

/// Result of an answer-generating (`ai-search`) call.
#[derive(Debug, Clone, Deserialize)]
pub struct AiSearchResult {
    /// Generated answer text.
    pub response: String,
    /// Documents the answer was grounded on.
    #[serde(default)]
    pub data: Vec<SourceDocument>,
}

impl AiSearchResult {
    /// Extract the typed answer/sources pair from a verbatim `ai_search` value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Query surface shared by the direct binding and the REST fallback.
///
/// `ai_search` returns the backend's result verbatim as JSON so answer-generating
/// responses can be forwarded unchanged; `search` is consumed by the dispatcher
/// itself and is typed.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Retrieval-only query: matching documents, no generated answer.
    async fn search(&self, invocation: &SearchInvocation) -> Result<RetrievalResult, BackendError>;

    /// Answer-generating query returning the backend result unmodified.
    async fn ai_search(
        &self,
        invocation: &SearchInvocation,
    ) -> Result<serde_json::Value, BackendError>;

    /// Answer-generating query returning the backend's event stream.
    async fn ai_search_stream(
        &self,
        invocation: &SearchInvocation,
    ) -> Result<ByteStream, BackendError>;
}
