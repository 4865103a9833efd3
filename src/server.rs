//! HTTP serving layer.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version and index readiness |
//! | `POST` | `/search` | Ranked chunks for a query |
//! | `POST` | `/ask` | Extractive (or rendered) answer with its sources |
//! | `POST` | `/reindex` | Reload documents and rebuild the index in the background |
//!
//! The first index build starts in the background when the server starts;
//! until it is installed, query endpoints answer `503 not_ready`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "index not ready: no index has been built yet" } }
//! ```
//!
//! Error codes: `bad_request` (400), `build_in_progress` (409),
//! `upstream_error` (502), `not_ready` (503), `internal` (500).

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::error::Error;
use crate::models::{Answer, ScoredResult};
use crate::pipeline::Pipeline;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    /// Cancelled on shutdown; stops any build in flight.
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, shutdown: CancellationToken) -> Self {
        Self { pipeline, shutdown }
    }
}

/// Start the server on `[server].bind` and run until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config)?);
    let shutdown = CancellationToken::new();
    let state = AppState::new(pipeline, shutdown.clone());

    start_reload(&state)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("KB server listening on http://{}", config.server.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/search", post(handle_search))
        .route("/ask", post(handle_ask))
        .route("/reindex", post(handle_reindex))
        .layer(cors)
        .with_state(state)
}

/// Spawn a background reload that logs its outcome.
fn start_reload(state: &AppState) -> Result<(), Error> {
    let handle = state.pipeline.try_start_reload(state.shutdown.child_token())?;
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(index)) => info!(rows = index.len(), "reindex complete"),
            Ok(Err(e)) => error!(error = %e, "reindex failed"),
            Err(e) => error!(error = %e, "reindex task panicked"),
        }
    });
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

/// Error that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
            Error::Config(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::BuildInProgress => (StatusCode::CONFLICT, "build_in_progress"),
            Error::Build(_) | Error::Embedding(_) | Error::Source(_) | Error::Generation(_) => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            Error::Cancelled => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    ready: bool,
    chunks: usize,
    mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    built_at: Option<String>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let session = state.pipeline.session();
    let current = session.current().ok();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ready: current.is_some(),
        chunks: current.as_ref().map(|i| i.len()).unwrap_or(0),
        mode: session.strategy().mode().to_string(),
        built_at: current.map(|i| i.built_at().to_rfc3339()),
    })
}

// ============ POST /search ============

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    min_score: Option<f64>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<ScoredResult>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::bad_request("query must not be empty"));
    }
    if req.top_k == Some(0) {
        return Err(AppError::bad_request("top_k must be >= 1"));
    }
    let results = state
        .pipeline
        .search(&req.query, req.top_k, req.min_score)
        .await?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
struct AskRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    /// Render with the configured generator when one exists.
    #[serde(default = "default_generate")]
    generate: bool,
}

fn default_generate() -> bool {
    true
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::bad_request("query must not be empty"));
    }
    if req.top_k == Some(0) {
        return Err(AppError::bad_request("top_k must be >= 1"));
    }
    let answer = state
        .pipeline
        .ask(&req.query, req.top_k, req.generate)
        .await?;
    Ok(Json(answer))
}

// ============ POST /reindex ============

async fn handle_reindex(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    start_reload(&state)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "started" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::AnswerParams;
    use crate::chunk::ChunkParams;
    use crate::index::IndexStrategy;
    use crate::models::Document;
    use crate::search::RetrievalParams;
    use crate::session::Session;
    use crate::source::StaticSource;

    fn state() -> AppState {
        let docs = vec![Document::new(
            "1",
            "Canvas",
            "u1",
            "Canvas enrollment is automatic for students in every unit.",
        )];
        let session = Session::new(ChunkParams::default(), IndexStrategy::default()).unwrap();
        let pipeline = Pipeline::new(
            Arc::new(StaticSource::new(docs)),
            session,
            RetrievalParams::default(),
            AnswerParams::default(),
        );
        AppState::new(Arc::new(pipeline), CancellationToken::new())
    }

    fn search_req(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            top_k: None,
            min_score: None,
        }
    }

    #[test]
    fn test_error_mapping() {
        let cases = [
            (Error::NotReady, StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
            (Error::config("x"), StatusCode::BAD_REQUEST, "bad_request"),
            (Error::BuildInProgress, StatusCode::CONFLICT, "build_in_progress"),
            (Error::Build("x".into()), StatusCode::BAD_GATEWAY, "upstream_error"),
            (Error::Embedding("x".into()), StatusCode::BAD_GATEWAY, "upstream_error"),
            (Error::Cancelled, StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        ];
        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status, status);
            assert_eq!(app.code, code);
        }
    }

    #[tokio::test]
    async fn test_search_not_ready_then_ready() {
        let state = state();
        let err = handle_search(State(state.clone()), Json(search_req("canvas")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);

        state
            .pipeline
            .reload(&CancellationToken::new())
            .await
            .unwrap();
        let Json(resp) = handle_search(State(state), Json(search_req("canvas enrollment")))
            .await
            .ok()
            .unwrap();
        assert_eq!(resp.results.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let err = handle_search(State(state()), Json(search_req("  ")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ask_and_health() {
        let state = state();
        state
            .pipeline
            .reload(&CancellationToken::new())
            .await
            .unwrap();

        let req = AskRequest {
            query: "canvas enrollment".to_string(),
            top_k: None,
            generate: false,
        };
        let Json(answer) = handle_ask(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(answer.supporting_results.len(), 1);

        let Json(health) = handle_health(State(state)).await;
        assert!(health.ready);
        assert_eq!(health.chunks, 1);
        assert_eq!(health.mode, "lexical");
    }

    #[tokio::test]
    async fn test_reindex_conflict_while_building() {
        let state = state();
        let permit = state.pipeline.session().try_begin_build().unwrap();
        let err = handle_reindex(State(state.clone())).await.err().unwrap();
        assert_eq!(err.status, StatusCode::CONFLICT);
        drop(permit);

        let (status, _) = handle_reindex(State(state)).await.unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
    }
}
