//! Pulse HTTP server.
//!
//! Configuration comes from `PULSE_CONFIG` (a TOML file, optional) with
//! environment variables layered on top. Logs go to stderr; set `RUST_LOG`
//! to change the filter.

use pulse::config::ServiceConfig;
use pulse::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("pulse starting");

    let config = ServiceConfig::load().map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        anyhow::anyhow!("pulse failed to load config: {e}")
    })?;
    let service = pulse::build_service(&config)?;
    tracing::info!(providers = ?service.orchestrator().provider_names(), "engine ready");

    server::serve(&config.server, AppState::new(service)).await?;

    tracing::info!("pulse shut down cleanly");
    Ok(())
}
