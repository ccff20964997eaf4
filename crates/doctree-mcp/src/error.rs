//! Error types for the doctree tool surface with JSON-RPC code mapping.

use thiserror::Error;

/// Errors that can occur while serving tool calls.
#[derive(Debug, Error)]
pub enum McpError {
    /// The engine rejected or failed the operation.
    #[error("{0}")]
    Engine(#[from] doctree_core::Error),

    /// The arguments object did not match the tool's schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// No tool with the requested name exists.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Request-level protocol violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl McpError {
    /// JSON-RPC error code for this failure.
    #[must_use]
    pub fn error_code(&self) -> i64 {
        match self {
            Self::Engine(e) => match e.kind() {
                "invalid_argument" | "not_found" => -32602,
                _ => -32603,
            },
            Self::InvalidArguments(_) | Self::UnknownTool(_) => -32602,
            Self::Protocol(_) => -32600,
        }
    }

    /// Stable taxonomy kind placed in `error.data.kind` on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Engine(e) => e.kind(),
            Self::InvalidArguments(_) | Self::UnknownTool(_) => "invalid_argument",
            Self::Protocol(_) => "protocol",
        }
    }
}

/// Result type alias for tool-surface operations.
pub type McpResult<T> = Result<T, McpError>;
