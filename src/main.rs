//! chat-relay - Chat relay API service
//!
//! Accepts chat questions over HTTP, forwards them to the answer backend,
//! and persists every question/answer pair.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use chat_relay::config::Config;
use chat_relay::services::BackendClient;
use chat_relay::{build_router, db, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting chat-relay v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::parse();
    info!("Backend: {} (timeout {}s)", config.backend_url, config.backend_timeout_secs);

    let pool = db::init_database(&config.database).await?;

    let backend = BackendClient::new(&config.backend_url, config.backend_timeout())
        .context("Failed to build backend HTTP client")?;

    let state = AppState::new(pool, Arc::new(backend));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!("chat-relay listening on http://{}", config.listen);
    info!("Health check: http://{}/api/health", config.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
