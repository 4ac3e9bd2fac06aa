//! HTTP error taxonomy shared by all handlers.
//!
//! Every error renders as `{error, details?}` JSON. CORS headers are attached by the
//! router middleware, so error bodies stay readable for browser clients.

use crate::backend::BackendError;
use crate::render::RenderError;
use crate::search::DispatchError;
use crate::storage::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Error returned from HTTP handlers, mapped onto the response taxonomy.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or unusable required field (400).
    #[error("{0}")]
    InvalidRequest(String),
    /// Bearer check failed (401); deliberately carries no detail.
    #[error("Unauthorized")]
    Unauthorized,
    /// Wrong HTTP verb for a matched path (405).
    #[error("Method not allowed")]
    MethodNotAllowed,
    /// Unmatched path or missing asset (404).
    #[error("Not found")]
    NotFound,
    /// An upstream service failed or is not configured (500).
    #[error("{message}")]
    Upstream {
        /// Summary of which upstream interaction failed.
        message: String,
        /// Upstream status/body text when safely stringifiable.
        details: Option<String>,
    },
}

impl ApiError {
    /// Build an upstream failure with detail text.
    pub(crate) fn upstream(message: &str, details: impl std::fmt::Display) -> Self {
        Self::Upstream {
            message: message.to_string(),
            details: Some(details.to_string()),
        }
    }

    /// Build an upstream failure for a missing optional configuration.
    pub(crate) fn not_configured(message: &str) -> Self {
        Self::Upstream {
            message: message.to_string(),
            details: None,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({ "error": self.to_string() });
        if let Self::Upstream {
            details: Some(details),
            ..
        } = &self
        {
            body["details"] = json!(details);
        }
        (status, Json(body)).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        Self::upstream("Search dispatch failed", err)
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        Self::upstream("Retrieval request failed", err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::upstream("Object store request failed", err)
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::InvalidUrl(_) | RenderError::HostNotAllowed(_) => {
                Self::InvalidRequest(err.to_string())
            }
            other => Self::upstream("Render request failed", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn invalid_request_renders_error_shape() {
        let (status, body) = body_of(ApiError::InvalidRequest("`query` missing".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "`query` missing");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn upstream_failure_carries_details() {
        let (status, body) = body_of(ApiError::upstream("Retrieval request failed", "503 busy")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Retrieval request failed");
        assert_eq!(body["details"], "503 busy");
    }

    #[tokio::test]
    async fn unauthorized_is_opaque() {
        let (status, body) = body_of(ApiError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn render_validation_errors_map_to_bad_request() {
        let error: ApiError = RenderError::HostNotAllowed("evil.example".into()).into();
        let (status, _) = body_of(error).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
