//! `keel-server`: the installer API served over HTTP.
//!
//! # Quick start
//!
//! ```sh
//! # Dry-run installer on the default port:
//! keel-server
//!
//! # Custom bind address and faster simulated probes:
//! KEEL_BIND=0.0.0.0:8080 KEEL_DRY_RUN_DELAY_MS=200 keel-server
//! ```
//!
//! # Environment variables
//!
//! See [`keel_server::ServerConfig`] for the full list.

use std::process::ExitCode;

use keel_server::{installer_app, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keel_server=info,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let bind_addr = config.bind_addr;
    if config.dry_run {
        tracing::info!(delay = ?config.dry_run_delay, "dry-run mode");
    }

    let app = match installer_app(config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("failed to assemble the server: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(endpoints = app.table.len(), "installer API derived");
    app.installer.start();

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {bind_addr}: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("listening on {bind_addr}");

    if let Err(e) = axum::serve(listener, app.router).await {
        tracing::error!("server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
