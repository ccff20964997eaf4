//! Browser-facing HTTP API, enabled by `ENABLE_WEBSERVER=true`.
//!
//! Read-only mirrors of the query surface under `/api`. Section identifiers
//! in URL paths are the dotted ids (URL-encoded by the client; axum decodes
//! them). Binding walks a port range starting at `WEBSERVER_PORT_BASE` and
//! gives up after twenty attempts, which fails startup.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use doctree_core::query;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;

use crate::state::SharedState;

/// How many consecutive ports to try from the configured base.
pub const PORT_ATTEMPTS: u16 = 20;

/// Bind the first free port in `[base, base + PORT_ATTEMPTS)`.
///
/// # Errors
///
/// Fails when every port in the range is taken; the caller treats this as a
/// startup failure.
pub async fn bind(base: u16) -> anyhow::Result<TcpListener> {
    for offset in 0..PORT_ATTEMPTS {
        let port = base.saturating_add(offset);
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
            return Ok(listener);
        }
    }
    anyhow::bail!(
        "no free port in {}..={}",
        base,
        base.saturating_add(PORT_ATTEMPTS - 1)
    )
}

/// Serve the API on an already-bound listener.
///
/// # Errors
///
/// Propagates fatal I/O errors from the HTTP server.
pub async fn serve(listener: TcpListener, state: SharedState) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "HTTP API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// The `/api` route table.
#[must_use]
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/structure", get(structure))
        .route("/api/section/{id}", get(section))
        .route("/api/metadata", get(metadata))
        .route("/api/dependencies", get(dependencies))
        .route("/api/validate", get(validate))
        .with_state(state)
}

type HttpResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn http_error(err: &doctree_core::Error) -> (StatusCode, Json<Value>) {
    let status = match err.kind() {
        "not_found" => StatusCode::NOT_FOUND,
        "invalid_argument" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({ "error": err.to_string(), "kind": err.kind() })),
    )
}

fn serialize<T: serde::Serialize>(payload: T) -> HttpResult {
    serde_json::to_value(payload).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string(), "kind": "io_error" })),
        )
    })
}

async fn structure(State(state): State<SharedState>) -> HttpResult {
    let index = state.index.read().await;
    serialize(query::get_root_files_structure(&index))
}

#[derive(Debug, Deserialize)]
struct SectionQuery {
    /// `section` (default) or `full`.
    #[serde(default)]
    context: Option<String>,
}

async fn section(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<SectionQuery>,
) -> HttpResult {
    let index = state.index.read().await;
    let view = query::get_section(&index, &id).map_err(|e| http_error(&e))?;

    let mut payload = serialize(&view)?.0;
    if params.context.as_deref() == Some("full") {
        let abs = index.project_root().join(&view.source_file);
        let full_content = std::fs::read_to_string(abs)
            .map_err(|e| http_error(&doctree_core::Error::Io(e)))?;
        payload["full_content"] = Value::String(full_content);
        payload["section_position"] = json!({
            "line_start": view.line_start,
            "line_end": view.line_end,
        });
    }
    Ok(Json(payload))
}

async fn metadata(State(state): State<SharedState>) -> HttpResult {
    let index = state.index.read().await;
    serialize(query::project_metadata(&index))
}

async fn dependencies(State(state): State<SharedState>) -> HttpResult {
    let index = state.index.read().await;
    serialize(query::get_dependencies(&index))
}

async fn validate(State(state): State<SharedState>) -> HttpResult {
    let index = state.index.read().await;
    serialize(query::validate_structure(&index))
}
