// src/main.rs
use std::net::SocketAddr;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use stockroom::config::{AppConfig, StorageKind};
use stockroom::database;
use stockroom::state::AppState;
use stockroom::store::postgres::PgStore;

#[tokio::main]
async fn main() {
    // Load environment variables before the filter reads RUST_LOG
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stockroom=debug")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return;
        }
    };

    let app_state = match build_state(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise storage");
            return;
        }
    };

    let app = stockroom::build_app(app_state);

    // Try port..port+20 so a busy port does not stop start-up
    let listener = {
        let mut bound = None;
        for offset in 0u16..=20 {
            let port = config.port.saturating_add(offset);
            let addr = SocketAddr::from((config.host, port));
            match TcpListener::bind(addr).await {
                Ok(l) => {
                    bound = Some((l, addr));
                    break;
                }
                Err(e) => {
                    if offset == 0 {
                        tracing::warn!(%addr, error = %e, "Port in use, trying next");
                    }
                }
            }
        }
        match bound {
            Some((l, addr)) => {
                tracing::info!("Server running on {}", addr);
                l
            }
            None => {
                tracing::error!(
                    "Failed to bind to any port starting at {} on {}",
                    config.port,
                    config.host
                );
                return;
            }
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
    }
}

async fn build_state(config: AppConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    match (config.storage, config.database_url.clone()) {
        (StorageKind::Memory, _) => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            Ok(AppState::in_memory(config))
        }
        (StorageKind::Postgres, Some(url)) => {
            let pool = database::create_pool(&url, config.db_max_connections).await?;
            if config.run_migrations {
                database::run_migrations(&pool).await?;
                tracing::info!("Migrations applied");
            }
            Ok(AppState::postgres(PgStore::new(pool), config))
        }
        (StorageKind::Postgres, None) => Err("DATABASE_URL must be set".into()),
    }
}
