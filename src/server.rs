//! HTTP API server.
//!
//! Exposes search, record retrieval, citation resolution, and summaries as
//! a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/search` | Ranked search across all record kinds |
//! | `GET`  | `/api/{kind}` | List `bills`, `opinions`, or `executive-orders` |
//! | `GET`  | `/api/{kind}/{id}` | Record with summary and citations |
//! | `GET`  | `/api/{kind}/{id}/citations` | Outgoing citations |
//! | `GET`  | `/api/{kind}/{id}/cited-by` | Records citing this one |
//! | `POST` | `/api/{kind}/{id}/summarize` | Generate or refresh the summary |
//! | `POST` | `/api/citations/resolve` | Parse and resolve citations in text |
//! | `GET`  | `/api/stats` | Record, citation, and sync counts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `summaries_disabled` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use civitas_core::models::{RecordKind, RecordRef};
use civitas_core::search::SearchHit;
use civitas_core::store::ResolvedCitation;

use crate::citations::{cited_by, citations_from, resolve_text, CitingRecord};
use crate::config::Config;
use crate::db;
use crate::get::{get_record, list_records, ListFilter, RecordResponse, RecordSummary};
use crate::search::{search_records, SearchQuery};
use crate::sqlite_store::SqliteStore;
use crate::stats::{get_stats, Stats};
use crate::summarize::{summarize_record, SummaryResponse};

const MAX_LIMIT: i64 = 100;
const DEFAULT_LIST_LIMIT: i64 = 20;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// Build the router with all routes and layers. Exposed for tests.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/search", get(handle_search))
        .route("/api/stats", get(handle_stats))
        .route("/api/citations/resolve", post(handle_resolve))
        .route("/api/{kind}", get(handle_list))
        .route("/api/{kind}/{id}", get(handle_get))
        .route("/api/{kind}/{id}/citations", get(handle_citations))
        .route("/api/{kind}/{id}/cited-by", get(handle_cited_by))
        .route("/api/{kind}/{id}/summarize", post(handle_summarize))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(AppState::new(config.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "server started");
    println!("Civitas API listening on http://{}", bind_addr);
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
    code: &'static str,
    message: String,
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn summaries_disabled() -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "summaries_disabled",
        message: "summaries are disabled; set [summarizer] provider in the config".to_string(),
    }
}

/// Map library errors to HTTP errors by message, the way the CLI reports
/// them: missing records are 404, validation failures 400.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let msg = format!("{:#}", err);
        if msg.contains("not found") {
            not_found(msg)
        } else if msg.contains("invalid") || msg.contains("must not be empty") {
            bad_request(msg)
        } else {
            tracing::error!("request failed: {}", msg);
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: msg,
            }
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

fn parse_kind(segment: &str) -> Result<RecordKind, AppError> {
    RecordKind::from_path_segment(segment)
        .ok_or_else(|| not_found(format!("unknown record kind: {}", segment)))
}

fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
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

// ============ GET /api/search ============

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    /// Comma-separated kinds (`bill,opinion`).
    kind: Option<String>,
    jurisdiction: Option<String>,
    since: Option<String>,
    limit: Option<i64>,
    #[serde(default)]
    offset: i64,
    #[serde(default)]
    explain: bool,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    if params.q.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let kinds = match params.kind.as_deref() {
        Some(list) => list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<RecordKind>())
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| bad_request(e.to_string()))?,
        None => Vec::new(),
    };

    let query = SearchQuery {
        query: params.q,
        kinds,
        jurisdiction: params.jurisdiction,
        since: params.since,
        limit: Some(clamp_limit(params.limit, state.config.search.final_limit)),
        offset: params.offset.max(0),
        explain: params.explain,
    };
    let results = search_records(&state.config, &query).await?;
    Ok(Json(SearchResponse { results }))
}

// ============ GET /api/{kind} ============

#[derive(Debug, Deserialize)]
struct ListParams {
    jurisdiction: Option<String>,
    session: Option<String>,
    limit: Option<i64>,
    #[serde(default)]
    offset: i64,
}

#[derive(Serialize)]
struct ListResponse {
    results: Vec<RecordSummary>,
}

async fn handle_list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<ListResponse> {
    let kind = parse_kind(&kind)?;
    let filter = ListFilter {
        jurisdiction: params.jurisdiction,
        session: params.session,
    };
    let results = list_records(
        &state.config,
        kind,
        &filter,
        clamp_limit(params.limit, DEFAULT_LIST_LIMIT),
        params.offset.max(0),
    )
    .await?;
    Ok(Json(ListResponse { results }))
}

// ============ GET /api/{kind}/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<RecordResponse> {
    let kind = parse_kind(&kind)?;
    Ok(Json(get_record(&state.config, kind, &id).await?))
}

// ============ GET /api/{kind}/{id}/citations, /cited-by ============

#[derive(Serialize)]
struct CitationsResponse {
    citations: Vec<ResolvedCitation>,
}

#[derive(Serialize)]
struct CitedByResponse {
    cited_by: Vec<CitingRecord>,
}

/// Open a store and confirm the record exists.
async fn open_for(config: &Config, key: &RecordRef) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::new(db::connect(config).await?);
    let exists = store.stored_hash(key).await?.is_some();
    if !exists {
        store.pool().close().await;
        anyhow::bail!("{} not found: {}", key.kind, key.id);
    }
    Ok(store)
}

async fn handle_citations(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<CitationsResponse> {
    let key = RecordRef::new(parse_kind(&kind)?, id);
    let store = open_for(&state.config, &key).await?;
    let citations = citations_from(store.pool(), &key).await;
    store.pool().close().await;
    Ok(Json(CitationsResponse {
        citations: citations?,
    }))
}

async fn handle_cited_by(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<CitedByResponse> {
    let key = RecordRef::new(parse_kind(&kind)?, id);
    let store = open_for(&state.config, &key).await?;
    let citing = cited_by(&store, &key).await;
    store.pool().close().await;
    Ok(Json(CitedByResponse { cited_by: citing? }))
}

// ============ POST /api/{kind}/{id}/summarize ============

async fn handle_summarize(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<SummaryResponse> {
    let kind = parse_kind(&kind)?;
    if !state.config.summarizer.is_enabled() {
        return Err(summaries_disabled());
    }
    let summary = summarize_record(&state.config, &RecordRef::new(kind, id)).await?;
    Ok(Json(summary))
}

// ============ POST /api/citations/resolve ============

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    text: String,
}

async fn handle_resolve(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<CitationsResponse> {
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    let citations = resolve_text(&state.config, &req.text).await?;
    Ok(Json(CitationsResponse { citations }))
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> ApiResult<Stats> {
    Ok(Json(get_stats(&state.config).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 20), 20);
        assert_eq!(clamp_limit(Some(0), 20), 1);
        assert_eq!(clamp_limit(Some(-5), 20), 1);
        assert_eq!(clamp_limit(Some(500), 20), MAX_LIMIT);
    }

    #[test]
    fn test_error_mapping() {
        let e: AppError = anyhow::anyhow!("bill not found: x").into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        let e: AppError = anyhow::anyhow!("invalid since date 'x'").into();
        assert_eq!(e.code, "bad_request");
        let e: AppError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(e.code, "internal");
        assert!(parse_kind("statutes").is_err());
        assert_eq!(parse_kind("executive-orders").ok(), Some(RecordKind::ExecutiveOrder));
    }
}
