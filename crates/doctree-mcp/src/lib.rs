//! # doctree-mcp
//!
//! Protocol surface over [`doctree_core`]: a line-delimited JSON-RPC tool
//! server on stdio for LLM hosts, plus an optional HTTP API for browser
//! clients. The dispatcher is the single entry point both transports target;
//! it validates argument shapes, invokes the query surface or the editor,
//! and marshals results back.

pub mod dispatcher;
pub mod error;
pub mod http;
pub mod server;
pub mod state;

pub use error::{McpError, McpResult};
pub use state::{ServerState, SharedState};
