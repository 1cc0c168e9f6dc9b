use anyhow::Context;
use marketplace_ledger::datasource::{
    HttpCollectionSource, InMemoryCollectionSource, LiveCollectionSource,
};
use marketplace_ledger::{
    api, config::Config, db::init_db, spawn_sync, Marketplace, SqliteWatermarkStore,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("Failed to initialize database at {}", config.database_path))?;
    let watermarks = Arc::new(SqliteWatermarkStore::new(pool));

    let source: Arc<dyn LiveCollectionSource> = match &config.document_api_url {
        Some(url) => {
            tracing::info!(
                %url,
                poll_ms = config.poll_interval.as_millis() as u64,
                "Using document API"
            );
            Arc::new(HttpCollectionSource::new(url.clone(), config.poll_interval))
        }
        None => {
            tracing::warn!("DOCUMENT_API_URL not set; using an empty in-memory store");
            Arc::new(InMemoryCollectionSource::new())
        }
    };

    let marketplace = Arc::new(Marketplace::new(
        source,
        watermarks,
        config.market_settings(),
    ));
    let _sync = spawn_sync(Arc::clone(&marketplace))
        .await
        .context("Failed to subscribe to collections")?;

    let app = api::create_router(api::AppState::new(marketplace, config));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
