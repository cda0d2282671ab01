//! Proxy middleware server.
//!
//! # Architecture Overview
//!
//! ```text
//! Client ──▶ axum server ──▶ proxy middleware ──▶ route match (context)
//!                                  │                    │
//!                                  │ no match           ▼
//!                                  ▼              rewrite path, pick target
//!                              404 fallback             │
//!                                                       ▼
//!                                          http client │ websocket relay ──▶ Backend
//!                                                       │
//!                                       hooks: proxyReq, proxyRes, proxyReqWs,
//!                                              open, close, error
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_middleware::config::{load_config, ConfigWatcher, ProxyConfig};
use proxy_middleware::observability::logging::init_tracing;
use proxy_middleware::{HttpServer, Logger};

#[derive(Parser)]
#[command(name = "proxy-middleware")]
#[command(about = "Path-routing HTTP and WebSocket proxy", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload routes when the configuration file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing("proxy_middleware=debug,tower_http=debug");

    tracing::info!("proxy-middleware v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    let logger = Logger::global();
    logger.configure(&config.observability.log_level, &config.observability.log_provider)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let server = HttpServer::new(&config)?;

    // Keep the watcher alive for the lifetime of the server
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            server.watch_updates(updates);
            Some(handle)
        }
        _ => None,
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
