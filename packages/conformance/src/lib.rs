//! Shared helpers for the installer API conformance suite.
//!
//! Provides [`spawn_server`], which binds a `TcpListener` on an ephemeral
//! port, serves a dry-run installer on it and returns both the local URL and
//! the installer handle, so tests can observe server-side state (such as the
//! number of suspended long-polls) that HTTP does not expose.

use std::sync::Arc;
use std::time::Duration;

use keel_client::{ApiClient, HttpTransport};
use keel_server::{installer_app, DryRunInstaller, ServerConfig};

/// Start an ephemeral in-process installer server and return
/// `(base_url, installer)`.
///
/// Simulated background work (probing, refresh check, the install itself)
/// takes `delay`. The server runs in a background `tokio` task bound to an
/// OS-assigned port on `127.0.0.1`, e.g. `http://127.0.0.1:51234`.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound or the schema fails to bind.
pub async fn spawn_server(delay: Duration) -> (String, Arc<DryRunInstaller>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");

    let config = ServerConfig {
        bind_addr: addr,
        dry_run: true,
        dry_run_delay: delay,
    };
    let app = installer_app(config).expect("assemble installer server");
    app.installer.start();

    let router = app.router;
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("conformance server error");
    });

    (base_url, app.installer)
}

/// A stub client for the installer table, talking to `base_url`.
///
/// # Panics
///
/// Panics if the installer schema is invalid or the HTTP client cannot be built.
pub fn api_client(base_url: &str) -> ApiClient {
    let table = keel_installer_api::installer_table().expect("installer schema");
    let transport = HttpTransport::with_timeout(base_url, Duration::from_secs(5))
        .expect("build HTTP transport");
    ApiClient::new(Arc::new(table), transport)
}
