//! Audiophile checkout - HTTP entry point

use anyhow::{Context, Result};
use audiophile_checkout::{api, config::Config, shutdown, store::{MemoryStore, PgStore, Store}};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn Store> = if config.uses_memory_store() {
        tracing::warn!("using in-memory store; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        let pg = PgStore::connect(&config.database_url, config.database_max_connections, config.database_acquire_timeout())
            .await
            .context("connecting to postgres")?;
        pg.migrate().await.context("running migrations")?;
        Arc::new(pg)
    };

    let nats = match config.nats_url() {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, order events disabled"); None }
        },
        None => None,
    };

    let state = api::AppState::new(store, nats).with_request_timeout(config.request_timeout());
    let app = api::router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("audiophile-checkout listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app)
        .with_graceful_shutdown(shutdown::signal())
        .await?;
    tracing::info!("audiophile-checkout stopped");
    Ok(())
}
