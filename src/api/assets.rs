//! Static asset fallback for unmatched paths.
//!
//! The pre-built documentation site is served through `ServeDir`, acting as the
//! external static-file resolver. Resolver hits pass through unchanged; only the
//! 404 branch attaches CORS headers, matching the behavior browsers observe on the
//! deployed site (same-origin asset fetches do not need the headers).

use crate::api::AppState;
use crate::cors::cors_headers;
use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// Serve a pre-built site file, or 404 with CORS headers on a resolver miss.
pub(crate) async fn static_fallback(
    State(state): State<AppState>,
    request: Request,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let resolver = ServeDir::new(&state.config().assets_dir);
    let response = match resolver.oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(err) => {
            tracing::error!(error = %err, "Static resolver failure");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Static resolver failure" })),
            )
                .into_response();
        }
    };

    if response.status() == StatusCode::NOT_FOUND {
        let cors = cors_headers(origin.as_deref(), &state.config().cors_allowed_origins);
        return (
            StatusCode::NOT_FOUND,
            cors,
            Json(json!({ "error": "Not found" })),
        )
            .into_response();
    }

    response
}
