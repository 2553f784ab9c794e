//! HTTP JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/stats` | Fragment count and sampled breakdowns |
//! | `POST` | `/search` | Profile/strategy-driven semantic search |
//!
//! `POST /search` takes `{query, n_results?, profile?, strategy?, limit?,
//! filter?}` and returns the ranked results, the numbered source list, and
//! a prompt-ready context block.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embeddings_disabled` (400),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use rag_harness_core::embedding::EmbeddingProvider;
use rag_harness_core::models::SearchResult;
use rag_harness_core::search::{format_context, format_sources};
use rag_harness_core::store::VectorIndex;

use crate::config::Config;
use crate::embedding::{create_provider, is_disabled};
use crate::search::{execute, resolve, SearchRequest};
use crate::sqlite_index::SqliteIndex;
use crate::stats::{collect_stats, IndexStats};

/// Shared state: the index and provider are opened once per process.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    index: Arc<dyn VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl AppState {
    pub fn new(
        config: Config,
        index: Arc<dyn VectorIndex>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            index,
            provider,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/search", post(handle_search))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let provider: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
    let index = SqliteIndex::open(config).await?;
    index.get_or_create().await?;

    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config.clone(), Arc::new(index), provider);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    println!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// A failure with the disabled provider maps to `embeddings_disabled`,
/// anything else to `internal`. The message is passed through unchanged.
fn classify_search_error(err: anyhow::Error, provider: &dyn EmbeddingProvider) -> AppError {
    let msg = format!("{:#}", err);
    if is_disabled(provider) {
        let mut e = bad_request(msg);
        e.code = "embeddings_disabled".to_string();
        e
    } else {
        tracing::error!(error = %msg, "search failed");
        internal(msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<IndexStats>, AppError> {
    collect_stats(state.index.as_ref(), &state.config.index.persist_directory)
        .await
        .map(Json)
        .map_err(|e| internal(format!("{:#}", e)))
}

// ============ POST /search ============

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    strategy: String,
    results: Vec<SearchResult>,
    sources: String,
    /// Prompt-ready context block.
    context: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let resolved = resolve(&state.config, &req).map_err(|e| bad_request(e.to_string()))?;

    let results = execute(
        &state.config,
        state.index.as_ref(),
        state.provider.as_ref(),
        &req,
    )
    .await
    .map_err(|e| classify_search_error(e, state.provider.as_ref()))?;

    Ok(Json(SearchResponse {
        sources: format_sources(&results),
        context: format_context(&results),
        strategy: resolved.strategy.name().to_string(),
        query: req.query,
        results,
    }))
}
