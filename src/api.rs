//! HTTP surface for the relay.
//!
//! This module exposes a compact Axum router over the component set:
//!
//! - `GET|POST /ask` (and the legacy alias `POST /api/autorag-search`) – Normalize the
//!   request into a search invocation and dispatch it; answers arrive buffered as JSON
//!   or as a forwarded event stream.
//! - `POST /mcp` – JSON-RPC tool-protocol endpoint for AI-agent clients.
//! - `POST /api/ingest` – Store a document blob and optionally trigger a re-index.
//! - `POST /api/sync` – Trigger a re-index on demand.
//! - `POST /api/render-ingest` – Render a remote page and store the HTML.
//! - `GET /api/status` – Operational flags plus a best-effort upstream detail fetch.
//! - anything else – Static asset fallback over the pre-built site.
//!
//! CORS headers are computed once per request: preflights short-circuit with 204
//! before any handler, and the API middleware attaches the headers to every response,
//! error paths included. The search dispatcher is shared with the tool-protocol
//! adapter so behavior is identical across interfaces.

mod assets;
mod error;
mod ingest;

pub use error::ApiError;

use crate::backend::{RestRetrieval, RetrievalBackend};
use crate::config::Config;
use crate::cors::cors_headers;
use crate::llm::{LlmError, build_generation_client};
use crate::mcp::{self, JsonRpcResponse};
use crate::render::{RenderClient, RenderError};
use crate::search::{AskParams, DispatchOutcome, SearchDispatcher, normalize};
use crate::storage::{BlobStore, ObjectStoreHttp, StorageError};
use crate::sync::SyncTrigger;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{RawQuery, Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors encountered while assembling the application state at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Retrieval REST client could not be constructed.
    #[error("Retrieval client setup failed: {0}")]
    Backend(#[from] crate::backend::BackendError),
    /// Generation provider selected but unusable.
    #[error("LLM provider setup failed: {0}")]
    Llm(#[from] LlmError),
    /// Object store client could not be constructed.
    #[error("Object store setup failed: {0}")]
    Storage(#[from] StorageError),
    /// Rendering client could not be constructed.
    #[error("Render client setup failed: {0}")]
    Render(#[from] RenderError),
    /// Shared HTTP client construction failed.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Shared application state passed to every handler.
///
/// Built once at startup from the immutable configuration; handlers never consult
/// the environment.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    dispatcher: Arc<SearchDispatcher>,
    rest: Arc<RestRetrieval>,
    store: Option<Arc<dyn BlobStore>>,
    sync: Arc<SyncTrigger>,
    render: Option<Arc<RenderClient>>,
}

impl AppState {
    /// Assemble clients and the dispatcher from configuration.
    pub fn from_config(config: Config) -> Result<Self, StartupError> {
        let rest = Arc::new(RestRetrieval::new(&config)?);
        let generation = build_generation_client(&config)?;
        let dispatcher = Arc::new(SearchDispatcher::new(
            rest.clone() as Arc<dyn RetrievalBackend>,
            generation,
        ));

        let store = match (&config.object_store_url, &config.object_store_bucket) {
            (Some(url), Some(bucket)) => Some(Arc::new(ObjectStoreHttp::new(
                url.clone(),
                bucket.clone(),
                config.object_store_token.clone(),
            )?) as Arc<dyn BlobStore>),
            _ => None,
        };

        let sync = Arc::new(SyncTrigger::new(&config)?);
        let render = config
            .render_endpoint
            .clone()
            .map(|endpoint| RenderClient::new(endpoint, config.render_allowed_hosts.clone()))
            .transpose()?
            .map(Arc::new);

        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            rest,
            store,
            sync,
            render,
        })
    }

    /// Install a direct retrieval binding, which takes precedence over REST.
    pub fn with_binding(mut self, binding: Arc<dyn RetrievalBackend>) -> Self {
        self.dispatcher = Arc::new(self.dispatcher.rebind(binding));
        self
    }

    /// Replace the blob store (embedders and tests).
    pub fn with_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The immutable relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn store(&self) -> Option<&Arc<dyn BlobStore>> {
        self.store.as_ref()
    }

    pub(crate) fn sync(&self) -> &SyncTrigger {
        &self.sync
    }

    pub(crate) fn render(&self) -> Option<&Arc<RenderClient>> {
        self.render.as_ref()
    }
}

/// Build the HTTP router exposing the relay surface.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/ask", get(ask).post(ask).fallback(method_not_allowed))
        .route(
            "/api/autorag-search",
            post(ask).fallback(method_not_allowed),
        )
        .route("/mcp", post(mcp_endpoint).fallback(method_not_allowed))
        .route(
            "/api/ingest",
            post(ingest::ingest_document).fallback(method_not_allowed),
        )
        .route(
            "/api/sync",
            post(ingest::trigger_sync).fallback(method_not_allowed),
        )
        .route(
            "/api/render-ingest",
            post(ingest::render_ingest).fallback(method_not_allowed),
        )
        .route(
            "/api/status",
            get(get_status).fallback(method_not_allowed),
        )
        .layer(middleware::from_fn_with_state(state.clone(), attach_cors));

    Router::new()
        .merge(api)
        .fallback(assets::static_fallback)
        .layer(middleware::from_fn_with_state(state.clone(), preflight))
        .with_state(state)
}

/// Short-circuit preflight requests on any path before other handlers run.
async fn preflight(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());
    let cors = cors_headers(origin, &state.config().cors_allowed_origins);
    (StatusCode::NO_CONTENT, cors).into_response()
}

/// Attach CORS headers to every API response, error paths included.
async fn attach_cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let cors = cors_headers(origin.as_deref(), &state.config().cors_allowed_origins);

    let mut response = next.run(request).await;
    for (name, value) in cors.iter() {
        response.headers_mut().insert(name, value.clone());
    }
    response
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Normalize a search request from either verb and dispatch it.
async fn ask(
    State(state): State<AppState>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let query_params: AskParams = raw_query
        .as_deref()
        .map(serde_urlencoded::from_str::<AskParams>)
        .transpose()
        .map_err(|err| ApiError::InvalidRequest(format!("Malformed query string: {err}")))?
        .unwrap_or_default();

    let body_params = if method == Method::POST && !body.is_empty() {
        Some(
            serde_json::from_slice::<AskParams>(&body)
                .map_err(|err| ApiError::InvalidRequest(format!("Malformed JSON body: {err}")))?,
        )
    } else {
        None
    };

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    let invocation = normalize(query_params, body_params, accept, state.config())
        .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;

    tracing::info!(
        top_k = invocation.top_k,
        score_threshold = invocation.score_threshold,
        stream = invocation.wants_stream,
        "Search request dispatched"
    );

    match state.dispatcher.dispatch(&invocation).await? {
        DispatchOutcome::Json(value) => Ok(Json(value).into_response()),
        DispatchOutcome::Stream(stream) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(stream),
        )
            .into_response()),
    }
}

/// Tool-protocol endpoint; the adapter shares the search dispatcher with `/ask`.
async fn mcp_endpoint(State(state): State<AppState>, body: Bytes) -> Json<JsonRpcResponse> {
    Json(mcp::handle(&state.dispatcher, state.config(), &body).await)
}

/// Response body for `GET /api/status`.
#[derive(Serialize)]
struct StatusResponse {
    /// Whether the retrieval backend identifiers are configured.
    retrieval_configured: bool,
    /// Whether a direct binding is installed ahead of the REST fallback.
    binding_available: bool,
    /// Whether the object store accepts ingestion.
    ingestion_enabled: bool,
    /// Active external generation provider.
    llm_provider: &'static str,
    /// Best-effort upstream instance detail; null when the fetch fails.
    instance: Option<Value>,
}

/// Report operational flags plus a best-effort upstream detail fetch.
async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let config = state.config();
    let instance = match state.rest.instance_detail().await {
        Ok(detail) => Some(detail),
        Err(err) => {
            tracing::debug!(error = %err, "Status detail fetch failed");
            None
        }
    };

    Json(StatusResponse {
        retrieval_configured: !config.retrieval_account_id.is_empty()
            && !config.retrieval_instance.is_empty(),
        binding_available: state.dispatcher.binding_available(),
        ingestion_enabled: config.ingestion_enabled(),
        llm_provider: state.dispatcher.generation_provider().unwrap_or("none"),
        instance,
    })
}
