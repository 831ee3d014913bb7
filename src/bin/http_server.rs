//! HTTP server binary.
//!
//! Serves the echo engine on the service path plus the upload and download
//! endpoints.
//!
//! Usage:
//!   http-server -interface=0.0.0.0 -port=8080
//!   http-server -config=http.json -chunked -debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use netsocket_rpc::config::{Properties, options_from_properties, parse_properties};
use netsocket_rpc::{EchoEngine, HttpOptions, HttpServer, MemoryFileStore, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let properties = parse_properties(std::env::args().skip(1));
    init_logging(properties.contains_key("debug"));

    if let Err(e) = run(&properties).await {
        eprintln!("[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(properties: &Properties) -> Result<()> {
    let mut options: HttpOptions = options_from_properties(properties)?;
    if properties.contains_key("chunked") {
        options = options.with_chunked_responses();
    }

    let server = HttpServer::new(options, Arc::new(EchoEngine), Arc::new(MemoryFileStore::new()))?;
    let addr = server.start().await?;
    info!(
        %addr,
        service = %server.options().service_path,
        "Press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await?;
    server.stop();
    server.wait().await;
    Ok(())
}

/// Installs the log subscriber; `RUST_LOG` wins over the default filter.
fn init_logging(debug: bool) {
    let default = if debug {
        "netsocket_rpc=debug"
    } else {
        "netsocket_rpc=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}
