//! HTTP server for the knowledge assistant.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/rag/search` | Top-K documents for a query |
//! | `POST` | `/api/rag/answer` | Generated answer with sources and confidence |
//! | `GET`  | `/health` | Health check (version and index counts) |
//!
//! ```text
//! POST /api/rag/search {"query": "gas smell", "topK": 3}
//!   → {"results": [{"id", "title", "category", "similarity"}]}
//!
//! POST /api/rag/answer {"question": "What if I smell gas?", "language": "en"}
//!   → {"answer", "sources": [{"id", "title", "category", "similarity"}], "confidence"}
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `completion_disabled` (503),
//! `service_error` (502), `timeout` (504), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the marketing site and
//! dashboards can call the API from the browser.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use energichain_rag_core::answer::DEFAULT_LANGUAGE;
use energichain_rag_core::models::SourceRef;
use energichain_rag_core::{RagEngine, ServiceError};

use crate::config::Config;
use crate::engine::{load_engine, CompletionUse};
use crate::progress::ProgressMode;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: RagEngine,
    pub documents: usize,
    pub indexed: usize,
    pub max_top_k: usize,
}

/// Starts the HTTP server.
///
/// Loads the corpus and embedding cache (indexing pending documents first
/// when `[index].auto_index` is set), then binds to `[server].bind` and
/// serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let loaded = load_engine(
        config,
        ProgressMode::default_for_tty(),
        CompletionUse::BestEffort,
    )
    .await?;

    let state = AppState {
        engine: loaded.engine,
        documents: loaded.documents,
        indexed: loaded.indexed,
        max_top_k: config.retrieval.max_top_k,
    };

    println!(
        "Knowledge base: {} documents, {} indexed",
        state.documents, state.indexed
    );
    if !config.completion.is_enabled() {
        println!("Completion provider disabled: /api/rag/answer will return 503");
    }

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("RAG server listening on http://{}", bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Build the router with all routes and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/rag/search", post(handle_search))
        .route("/api/rag/answer", post(handle_answer))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"service_error"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            eprintln!("request failed [{}]: {}", self.code, self.message);
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Map engine errors to HTTP statuses. External-service failures are
/// recognised by downcasting to [`ServiceError`]; anything else is internal.
fn classify_error(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);
    match err.downcast_ref::<ServiceError>() {
        Some(ServiceError::CompletionDisabled) => AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "completion_disabled",
            message,
        },
        Some(ServiceError::Timeout(_)) => AppError {
            status: StatusCode::GATEWAY_TIMEOUT,
            code: "timeout",
            message,
        },
        Some(ServiceError::Embedding(_)) | Some(ServiceError::Completion(_)) => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "service_error",
            message,
        },
        None => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message,
        },
    }
}

/// Unwrap a JSON body, turning axum's rejection into the error contract.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v)
        .map_err(|rejection| bad_request(format!("invalid request body: {}", rejection.body_text())))
}

/// Reject a blank required field.
fn require_text(field: &str, value: Option<String>) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(bad_request(format!("{} must not be empty", field))),
    }
}

fn check_top_k(top_k: Option<usize>, max: usize) -> Result<Option<usize>, AppError> {
    match top_k {
        Some(k) if k < 1 || k > max => Err(bad_request(format!(
            "topK must be between 1 and {}",
            max
        ))),
        other => Ok(other),
    }
}

// ============ POST /api/rag/search ============

#[derive(Deserialize)]
pub struct SearchRequest {
    query: Option<String>,
    #[serde(default, rename = "topK", alias = "top_k")]
    top_k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    results: Vec<SourceRef>,
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let req = json_body(body)?;
    let query = require_text("query", req.query)?;
    let top_k = check_top_k(req.top_k, state.max_top_k)?;

    let results = state
        .engine
        .search(&query, top_k)
        .await
        .map_err(classify_error)?;

    Ok(Json(SearchResponse {
        results: results.iter().map(SourceRef::from).collect(),
    }))
}

// ============ POST /api/rag/answer ============

#[derive(Deserialize)]
pub struct AnswerRequest {
    question: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default, rename = "topK", alias = "top_k")]
    top_k: Option<usize>,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    answer: String,
    sources: Vec<SourceRef>,
    confidence: f32,
}

async fn handle_answer(
    State(state): State<AppState>,
    body: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, AppError> {
    let req = json_body(body)?;
    let question = require_text("question", req.question)?;
    let top_k = check_top_k(req.top_k, state.max_top_k)?;
    let language = req
        .language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let answer = state
        .engine
        .answer(&question, &language, top_k)
        .await
        .map_err(classify_error)?;

    Ok(Json(AnswerResponse {
        answer: answer.text,
        sources: answer.sources,
        confidence: answer.confidence,
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    documents: usize,
    indexed: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.documents,
        indexed: state.indexed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{DisabledCompleter, ExtractiveCompleter};
    use crate::embedding::HashEmbedder;
    use energichain_rag_core::completion::Completer;
    use energichain_rag_core::embedding::Embedder;
    use energichain_rag_core::models::Document;
    use energichain_rag_core::store::memory::InMemoryStore;
    use energichain_rag_core::store::{IndexedDocument, VectorStore};
    use std::sync::Arc;

    async fn leak_state(completer: Arc<dyn Completer>) -> AppState {
        let embedder = HashEmbedder::new(256);
        let doc = Document::new("d1", "Leak", "turn off valve", "safety");
        let vector = embedder.embed_text(&doc.embed_text());
        let store = InMemoryStore::new();
        store
            .replace_all(vec![IndexedDocument {
                document: doc,
                vector,
            }])
            .await
            .unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(embedder);
        AppState {
            engine: RagEngine::new(embedder, completer, Arc::new(store)),
            documents: 1,
            indexed: 1,
            max_top_k: 25,
        }
    }

    async fn spawn(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn search_returns_results_shape() {
        let base = spawn(leak_state(Arc::new(ExtractiveCompleter)).await).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/rag/search", base))
            .json(&serde_json::json!({"query": "how to detect a leak", "topK": 3}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["id"], "d1");
        assert_eq!(results[0]["category"], "safety");
        assert!(results[0]["similarity"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn answer_cites_sources() {
        let base = spawn(leak_state(Arc::new(ExtractiveCompleter)).await).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/rag/answer", base))
            .json(&serde_json::json!({"question": "how to detect a leak", "language": "en"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["sources"][0]["id"], "d1");
        assert!(body["answer"].as_str().unwrap().contains("turn off valve"));
        assert!(body["confidence"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn missing_query_is_bad_request() {
        let base = spawn(leak_state(Arc::new(ExtractiveCompleter)).await).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/rag/search", base))
            .json(&serde_json::json!({"topK": 3}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn out_of_range_top_k_is_bad_request() {
        let base = spawn(leak_state(Arc::new(ExtractiveCompleter)).await).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/rag/search", base))
            .json(&serde_json::json!({"query": "leak", "topK": 0}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let base = spawn(leak_state(Arc::new(ExtractiveCompleter)).await).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/rag/answer", base))
            .header("Content-Type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn disabled_completion_is_service_unavailable() {
        let base = spawn(leak_state(Arc::new(DisabledCompleter)).await).await;
        let resp = reqwest::Client::new()
            .post(format!("{}/api/rag/answer", base))
            .json(&serde_json::json!({"question": "leak?"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "completion_disabled");
    }

    #[test]
    fn service_errors_map_to_gateway_statuses() {
        let e = classify_error(ServiceError::Embedding("boom".into()).into());
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
        let e = classify_error(ServiceError::Timeout("slow".into()).into());
        assert_eq!(e.status, StatusCode::GATEWAY_TIMEOUT);
        let e = classify_error(anyhow::anyhow!("lock poisoned"));
        assert_eq!(e.code, "internal");
    }
}
