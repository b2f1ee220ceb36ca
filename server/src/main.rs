//! onecode license server
//!
//! Serves the license registry over HTTP/JSON: code issuance, first-use
//! device binding, and the admin operations.
//!
//! Usage:
//!   ONECODE_SECRET_KEY=... ONECODE_ADMIN_KEY=... onecode-server --port 3000
//!
//! Both secrets are mandatory; the server refuses to start without them.

use std::sync::Arc;
use anyhow::{Context, Result};
use clap::Parser;
use onecode_server::{build_router, shutdown_signal, ServerArgs};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("onecode license server starting...");
    let registry = Arc::new(
        args.open_registry()
            .context("failed to open license registry")?,
    );
    let backend = registry.store().backend();

    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!("\n========================================");
    println!("  onecode License Server Running");
    println!("========================================");
    println!("  Listen:  http://{}", addr);
    println!("  Store:   {}", backend);
    println!("========================================\n");

    info!(%addr, backend, "HTTP API listening");
    axum::serve(listener, build_router(Arc::clone(&registry)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    registry.close().context("failed to close license store")?;
    info!("shutdown complete");
    Ok(())
}
