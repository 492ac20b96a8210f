//! barre-api - HTTP service for the Barre class-booking platform
//!
//! Customer booking and attendance, the credit ledger, admin back office,
//! and AI-assisted recommendations over a single SQLite database.

use anyhow::Result;
use barre_api::{build_router, services::ai_client::AiClient, AppState};
use barre_common::config::ServiceConfig;
use barre_common::db::init::init_database;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting Barre API (barre-api) v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load()?;
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path).await?;
    info!("✓ Database ready");

    if config.anthropic_api_key.is_some() {
        info!("✓ AI generation enabled");
    } else {
        info!("AI generation disabled (no API key) - fallback responses will be used");
    }

    let ai = AiClient::new(config.anthropic_api_key.clone(), config.ai_timeout_secs);
    let state = AppState::new(pool, config.session_ttl_hours, ai);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("barre-api listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
