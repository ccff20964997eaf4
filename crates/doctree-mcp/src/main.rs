//! Entry point: index a documentation tree, watch it, and serve the tool
//! protocol on stdio (plus the optional HTTP API).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use doctree_mcp::{http, server, ServerState};
use tracing::{error, warn};

/// Navigate, query, and edit a tree of AsciiDoc/Markdown documentation
/// through a JSON-RPC tool protocol.
#[derive(Debug, Parser)]
#[command(name = "doctree-mcp", version, about)]
struct Cli {
    /// Project directory containing the documentation tree.
    project_root: PathBuf,

    /// Also serve the browser-facing HTTP API.
    #[arg(
        long,
        env = "ENABLE_WEBSERVER",
        action = clap::ArgAction::Set,
        default_value_t = false
    )]
    enable_webserver: bool,

    /// First port to try for the HTTP API; the next nineteen are fallbacks.
    #[arg(long, env = "WEBSERVER_PORT_BASE", default_value_t = 8080)]
    webserver_port_base: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Invalid arguments exit with code 2 via clap before we get here.
    let cli = Cli::parse();

    // Stdout carries the JSON-RPC stream; all logging goes to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("startup failed: {e:#}");
            ExitCode::from(1)
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = ServerState::new(&cli.project_root)
        .with_context(|| format!("failed to index {}", cli.project_root.display()))?;

    // Watcher thread feeds change batches to a single refresh task.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _watch = doctree_core::spawn_watcher(
        state.indexer.project_root().to_path_buf(),
        state.suppressor.clone(),
        tx,
    );
    let refresh_state = state.clone();
    tokio::spawn(async move {
        while let Some(batch) = rx.recv().await {
            if let Err(e) = refresh_state.refresh_paths(&batch).await {
                warn!(error = %e, "refresh failed");
            }
        }
    });

    if cli.enable_webserver {
        let listener = http::bind(cli.webserver_port_base)
            .await
            .context("failed to bind the HTTP API")?;
        let http_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = http::serve(listener, http_state).await {
                error!(error = %e, "HTTP API terminated");
            }
        });
    }

    server::serve_stdio(state).await;
    Ok(())
}
