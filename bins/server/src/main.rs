//! Chargebook API Server
//!
//! Main entry point for the reconciliation and ledger service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chargebook_api::{AppState, create_router};
use chargebook_core::engine::{ChargeEngine, EngineSettings};
use chargebook_db::{DbStore, connect};
use chargebook_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chargebook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    info!(
        local_currency = %config.ledger.local_currency,
        auto_assign_threshold = %config.matching.auto_assign_threshold,
        "Configuration loaded"
    );

    let db = connect(&config.database).await?;
    info!("Connected to database");

    let store = Arc::new(DbStore::new(db));
    let engine = ChargeEngine::new(store, EngineSettings::from(&config));
    let app = create_router(AppState::new(engine));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
