//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/contracts` | Filtered contract list (query parameters as `cdesk list`) |
//! | `POST` | `/contracts/sample` | Representative sample, body `{ "size": N }` |
//! | `GET`  | `/stats` | Category breakdown across all dimensions |
//! | `GET`  | `/filters` | Saved custom filters |
//! | `POST` | `/filters/infer` | LLM filter-kind suggestion, body `{ "column": "..." }` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "size must not be negative" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `llm_disabled` (400),
//! `llm_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the dashboard can be
//! served from another origin.

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use contract_desk_core::analysis::ParseError;
use contract_desk_core::category::CategoryBreakdown;
use contract_desk_core::custom_filter::CustomFilter;
use contract_desk_core::models::ContractRecord;
use contract_desk_core::store::ContractStore;

use crate::config::Config;
use crate::contracts::{self, ContractQuery, SampleResult};
use crate::filters_cmd::{self, FilterSuggestion};
use crate::llm::{LlmClient, LlmError};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ContractStore>,
    pub llm: Arc<dyn LlmClient>,
}

/// Build the router. Split from [`run_server`] so tests can serve it on an
/// ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/contracts", get(handle_list_contracts))
        .route("/contracts/sample", post(handle_sample))
        .route("/stats", get(handle_stats))
        .route("/filters", get(handle_list_filters))
        .route("/filters/infer", post(handle_infer_filter))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("Contract Desk API listening on http://{}", bind_addr);
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
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

fn internal(err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: "internal error".to_string(),
    }
}

/// Map LLM failures onto HTTP errors; anything else is internal.
fn classify_llm_error(err: anyhow::Error) -> AppError {
    if err.is::<ParseError>() {
        return AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "llm_error",
            message: format!("unusable model reply: {:#}", err),
        };
    }
    let Some(llm_err) = err.downcast_ref::<LlmError>() else {
        return internal(err);
    };
    let message = format!("{:#}", err);
    match llm_err {
        LlmError::Disabled | LlmError::MissingApiKey(_) => AppError {
            status: StatusCode::BAD_REQUEST,
            code: "llm_disabled",
            message,
        },
        LlmError::Validation(_) => bad_request(message),
        _ => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "llm_error",
            message,
        },
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

// ============ GET /contracts ============

#[derive(Serialize)]
struct ContractListResponse {
    total: usize,
    contracts: Vec<ContractRecord>,
}

async fn handle_list_contracts(
    State(state): State<AppState>,
    query: Result<Query<ContractQuery>, QueryRejection>,
) -> Result<Json<ContractListResponse>, AppError> {
    let Query(query) = query.map_err(|e| bad_request(e.body_text()))?;
    let filter = query
        .to_filter()
        .map_err(|e| bad_request(format!("{:#}", e)))?;
    let contracts = state
        .store
        .query_contracts(&filter, contracts::today())
        .await
        .map_err(internal)?;
    Ok(Json(ContractListResponse {
        total: contracts.len(),
        contracts,
    }))
}

// ============ POST /contracts/sample ============

#[derive(Deserialize, Default)]
struct SampleRequest {
    size: Option<i64>,
}

async fn handle_sample(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SampleResult>, AppError> {
    let request: SampleRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SampleRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid body: {}", e)))?
    };
    let size = match request.size {
        None => state.config.sampling.default_size,
        Some(n) if n < 0 => return Err(bad_request("size must not be negative")),
        Some(n) => usize::try_from(n).map_err(|_| bad_request("size is too large"))?,
    };
    match contracts::sample_contracts(state.store.as_ref(), size, contracts::today()).await {
        Ok(result) => Ok(Json(result)),
        Err(e) if e.is::<contracts::NoContracts>() => Err(not_found(e.to_string())),
        Err(e) => Err(internal(e)),
    }
}

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<CategoryBreakdown>, AppError> {
    let all = state.store.all_contracts().await.map_err(internal)?;
    Ok(Json(CategoryBreakdown::compute(&all, contracts::today())))
}

// ============ GET /filters ============

#[derive(Serialize)]
struct FilterListResponse {
    filters: Vec<CustomFilter>,
}

async fn handle_list_filters(
    State(state): State<AppState>,
) -> Result<Json<FilterListResponse>, AppError> {
    let filters = state.store.custom_filters().await.map_err(internal)?;
    Ok(Json(FilterListResponse { filters }))
}

// ============ POST /filters/infer ============

#[derive(Deserialize)]
struct InferRequest {
    column: String,
}

async fn handle_infer_filter(
    State(state): State<AppState>,
    request: Result<Json<InferRequest>, JsonRejection>,
) -> Result<Json<FilterSuggestion>, AppError> {
    let Json(request) = request.map_err(|e| bad_request(e.body_text()))?;
    if request.column.trim().is_empty() {
        return Err(bad_request("column must not be empty"));
    }
    filters_cmd::infer_filter(state.llm.as_ref(), state.store.as_ref(), &request.column)
        .await
        .map(Json)
        .map_err(|e| {
            if e.is::<filters_cmd::UnknownColumn>() {
                bad_request(e.to_string())
            } else {
                classify_llm_error(e)
            }
        })
}
