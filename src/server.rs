//! HTTP tool server.
//!
//! Lets an agent runtime call the wiki tools over plain JSON:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool, body is its parameters |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Successful calls answer `{ "result": ... }`. Errors use
//! `{ "error": { "code": "...", "message": "..." } }` with codes
//! `bad_request` (400), `not_found` (404) and `tool_error` (500). Sync and
//! search failures are not errors here: the tools report them in `result`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::RetrievalEngine;
use crate::mirror::GitMirror;
use crate::tools::{validate_params, ToolContext, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

/// Serve the built-in tools over a [`GitMirror`] built from `config`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(RetrievalEngine::new(GitMirror::new(config.repo_location())));
    run_server_with_engine(&config.server.bind, engine, ToolRegistry::new()).await
}

/// Serve the built-in tools plus `extra_tools` on `bind`.
///
/// Extra tools with a built-in's name replace it.
pub async fn run_server_with_engine(
    bind: &str,
    engine: Arc<RetrievalEngine>,
    extra_tools: ToolRegistry,
) -> anyhow::Result<()> {
    let mut registry = ToolRegistry::with_builtins();
    registry.extend(extra_tools);

    for t in registry.tools() {
        info!(tool = t.name(), builtin = t.is_builtin(), "registered tool");
    }

    let app = router(Arc::new(registry), ToolContext::new(engine));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("tool server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Exposed separately so tests and embedders can mount it.
pub fn router(tools: Arc<ToolRegistry>, ctx: ToolContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { tools, ctx })
}

// ============ Error response ============

/// JSON error body: `{ "error": { "code", "message" } }`.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Machine-readable code plus a human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Handler error that renders as an [`ErrorBody`] with its status.
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

/// 400, for parameters that fail schema validation.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// 404, for a tool name nobody registered.
fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// 500, for a tool whose `execute` returned an error.
fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::from_tool(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let result = tool.execute(params, &state.ctx).await.map_err(|e| {
        warn!(tool = %name, error = %e, "tool failed");
        tool_error(format!("{}: {}", name, e))
    })?;

    Ok(Json(serde_json::json!({ "result": result })))
}
