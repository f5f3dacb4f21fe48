use std::sync::Arc;

use formbricks_api_rust::database::{DatabaseManager, MemoryStore, PgStore, Store};
use formbricks_api_rust::{app, config, state::AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, ENCRYPTION_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config().clone();
    tracing::info!("Starting Formbricks API in {:?} mode", config.environment);

    let store: Arc<dyn Store> = if config.database.url.is_some() {
        Arc::new(PgStore::new(DatabaseManager::connect(&config.database).await?))
    } else {
        tracing::warn!("DATABASE_URL not set, data lives in memory and is lost on exit");
        Arc::new(MemoryStore::new())
    };

    let port = config.api.port;
    let state = AppState::new(store, config)?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Formbricks API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
