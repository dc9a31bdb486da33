//! Lexledger API Server
//!
//! Main entry point for the advance & retainer ledger service.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lexledger_api::{AppState, create_router};
use lexledger_core::{AdvanceService, AdvanceStore, MemoryAdvanceStore};
use lexledger_db::{AdvanceRepository, connect_with};
use lexledger_shared::{AppConfig, LedgerBackend, types::CurrencyCode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    let json = config.log.json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lexledger=debug,tower_http=debug".into()),
        )
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .init();

    // Select the storage backend once
    let store: Arc<dyn AdvanceStore> = match config.ledger.backend {
        LedgerBackend::Memory => Arc::new(MemoryAdvanceStore::new()),
        LedgerBackend::Postgres => {
            let db = connect_with(&config.database).await?;
            info!(
                max_connections = config.database.max_connections,
                "Connected to database"
            );
            Arc::new(AdvanceRepository::new(db))
        }
    };

    let default_currency: CurrencyCode = config.ledger.default_currency.parse()?;
    let service = AdvanceService::new(store).with_default_currency(default_currency);
    info!(
        backend = service.backend_name(),
        default_currency = %config.ledger.default_currency,
        "Ledger service ready"
    );

    // Create router
    let app = create_router(AppState::new(service)).layer(TimeoutLayer::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )));

    // Start server
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
