//! Line-delimited JSON-RPC over stdio.
//!
//! The server answers `initialize`, `tools/list`, `tools/call`, and
//! `shutdown`. `initialize` must succeed before any `tools/call`; tool
//! failures become structured JSON-RPC errors carrying the taxonomy kind in
//! `error.data.kind`. No exception escapes the dispatcher. Stdout belongs to
//! the protocol stream — logging goes to stderr.

use std::sync::atomic::Ordering;

use jsonrpc_core::{Error as RpcError, ErrorCode, IoHandler, Params, Value};
use jsonrpc_stdio_server::ServerBuilder;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::dispatcher::{dispatch, tool_definitions};
use crate::error::McpError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

fn to_rpc_error(err: &McpError) -> RpcError {
    let code = match err.error_code() {
        -32600 => ErrorCode::InvalidRequest,
        -32602 => ErrorCode::InvalidParams,
        other => ErrorCode::ServerError(other),
    };
    RpcError {
        code,
        message: err.to_string(),
        data: Some(json!({ "kind": err.kind() })),
    }
}

/// Wire up the four protocol methods.
#[must_use]
pub fn build_handler(state: SharedState) -> IoHandler {
    let mut io = IoHandler::new();

    {
        let state = state.clone();
        io.add_method("initialize", move |_params: Params| {
            let state = state.clone();
            async move {
                state.initialized.store(true, Ordering::SeqCst);
                debug!("session initialized");
                Ok(json!({
                    "protocolVersion": "2024-11-05",
                    "serverInfo": {
                        "name": "doctree-mcp",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": { "tools": {} }
                }))
            }
        });
    }

    io.add_method("tools/list", move |_params: Params| async move {
        Ok(json!({ "tools": tool_definitions() }))
    });

    {
        let state = state.clone();
        io.add_method("tools/call", move |params: Params| {
            let state = state.clone();
            async move {
                if !state.initialized.load(Ordering::SeqCst) {
                    return Err(RpcError {
                        code: ErrorCode::InvalidRequest,
                        message: "initialize must be called before tools/call".to_string(),
                        data: Some(json!({ "kind": "protocol" })),
                    });
                }

                let call: CallParams = params.parse()?;
                let arguments = call.arguments.unwrap_or_else(|| json!({}));
                debug!(tool = call.name, "tool call");

                dispatch(&state, &call.name, arguments)
                    .await
                    .map_err(|err| to_rpc_error(&err))
            }
        });
    }

    io.add_method("shutdown", move |_params: Params| async move {
        info!("shutdown requested");
        Ok(Value::Null)
    });

    io
}

/// Serve the protocol over stdin/stdout until the input stream closes.
pub async fn serve_stdio(state: SharedState) {
    info!("doctree tool server starting on stdio");
    let io = build_handler(state);
    ServerBuilder::new(io).build().await;
    info!("stdio stream closed, shutting down");
}
