//! HTTP surface for the Pulse engine.
//!
//! ## Endpoints
//!
//! - `GET /news/{category}`: latest articles for a category, via provider failover
//! - `GET /news/rss/{provider}`: a cloud vendor's blog feed (`aws`, `gcp`, ...)
//! - `GET /search?q=`: baseline free-text search through the providers
//! - `GET /search/v2?q=&category=&provider=&limit=&max_hours=&decay_factor=`:
//!   semantic search
//! - `GET /health`: provider eligibility, quotas, cache status and usage counters

pub mod handlers;
pub mod state;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
pub use state::AppState;

/// Build the router the binary serves.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/news/{category}", get(handlers::news))
        .route("/news/rss/{provider}", get(handlers::cloud_news))
        .route("/search", get(handlers::search))
        .route("/search/v2", get(handlers::search_v2))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `{host}:{port}` and serve until the task is cancelled or ctrl-c.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!("pulse listening on http://{local_addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
