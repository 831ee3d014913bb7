//! Socket server binary.
//!
//! Serves the echo engine and an in-memory (or temp-file) payload store.
//!
//! Usage:
//!   netsocket-server -interface=0.0.0.0 -port=8888
//!   netsocket-server -config=server.json -store=temp -debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use netsocket_rpc::config::{Properties, options_from_properties, parse_properties};
use netsocket_rpc::{
    EchoEngine, FileStore, MemoryFileStore, NetSocketServer, Result, ServerOptions, TempFileStore,
};
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
    let options: ServerOptions = options_from_properties(properties)?;

    let store: Arc<dyn FileStore> = match properties.get("store").map(String::as_str) {
        Some("temp") => Arc::new(TempFileStore::new()?),
        _ => Arc::new(MemoryFileStore::new()),
    };

    let server = NetSocketServer::new(options, Arc::new(EchoEngine), store)?;
    let addr = server.start().await?;
    info!(%addr, "Press Ctrl+C to stop");

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
