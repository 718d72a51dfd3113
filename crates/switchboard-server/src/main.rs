//! switchboard: stage-1 call routing engine.
//!
//! Reads config from env vars (see `config::SwitchboardConfig`); serves the
//! telephone engine's control channel and the diagnostic HTTP endpoint
//! side by side, sharing one `Dispatcher`.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use switchboard_cache::{CacheGateway, InProcessCacheGateway, RedisCacheGateway};
use switchboard_server::{config::SwitchboardConfig, Dispatcher, Metrics};
use switchboard_store::{PostgresStoreGateway, StoreGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,switchboard_server=debug".into()),
        )
        .init();

    let config = Arc::new(SwitchboardConfig::from_env()?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    tracing::info!("connected to store database");

    let store: Arc<dyn StoreGateway> = Arc::new(PostgresStoreGateway::new(pool));

    let cache: Arc<dyn CacheGateway> = match &config.redis_url {
        Some(url) => {
            tracing::info!("using redis cache backend");
            Arc::new(RedisCacheGateway::connect(url).await?)
        }
        None => {
            tracing::info!("using in-process cache backend");
            Arc::new(InProcessCacheGateway::new())
        }
    };

    let metrics = Arc::new(Metrics::new());
    let dispatcher = Arc::new(Dispatcher::new(
        store,
        cache,
        Arc::clone(&config),
        metrics,
    ));

    let http_addr = config.http_addr.clone();
    let control_addr = config.control_channel_addr.clone();

    let http_dispatcher = Arc::clone(&dispatcher);
    let http_task = tokio::spawn(async move {
        let app = switchboard_server::http::router(http_dispatcher);
        let listener = tokio::net::TcpListener::bind(&http_addr).await?;
        tracing::info!(addr = %http_addr, "diagnostic HTTP endpoint listening");
        axum::serve(listener, app).await
    });

    let control_dispatcher = Arc::clone(&dispatcher);
    let control_task = tokio::spawn(async move {
        switchboard_server::control_channel::serve(&control_addr, control_dispatcher).await
    });

    tokio::select! {
        res = http_task => {
            res??;
        }
        res = control_task => {
            res??;
        }
    }

    Ok(())
}
