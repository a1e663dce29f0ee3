//! Server configuration, populated from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration for the installer server.
///
/// All fields are populated from environment variables with defaults, so the
/// server can be started with zero configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `KEEL_BIND` | `127.0.0.1:7777` | TCP socket address to listen on |
/// | `KEEL_DRY_RUN` | `true` | Serve the simulated installer and enable `/dry_run/*` |
/// | `KEEL_DRY_RUN_DELAY_MS` | `2000` | How long simulated probes and checks take |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Whether the dry-run-only endpoints are served.
    pub dry_run: bool,

    /// Delay before simulated background work (storage probe, refresh
    /// check, install steps) completes.
    pub dry_run_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7777)),
            dry_run: true,
            dry_run_delay: Duration::from_millis(2000),
        }
    }
}

impl ServerConfig {
    /// Populate config from environment variables, applying defaults where
    /// absent or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = std::env::var("KEEL_BIND")
            .ok()
            .and_then(|v| v.parse::<SocketAddr>().ok())
            .unwrap_or(defaults.bind_addr);

        let dry_run = std::env::var("KEEL_DRY_RUN")
            .ok()
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.dry_run);

        let dry_run_delay = std::env::var("KEEL_DRY_RUN_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.dry_run_delay);

        Self {
            bind_addr,
            dry_run,
            dry_run_delay,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off" | ""
    )
}
