use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cinelog_api::{
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache, PgEntityStore},
    routes::{create_router, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cinelog_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    run_migrations(&pool).await?;

    let mut state = AppState::new(Arc::new(PgEntityStore::new(pool)))
        .with_cold_start_sample_size(config.cold_start_sample_size);

    let mut cache_handle = None;
    if let Some(redis_url) = &config.redis_url {
        let client = create_redis_client(redis_url)?;
        let (cache, handle) = Cache::new(client).await;
        state = state.with_cache(cache, config.movie_cache_ttl);
        cache_handle = Some(handle);
        tracing::info!("Movie cache enabled");
    } else {
        tracing::info!("REDIS_URL not set, movie cache disabled");
    }

    let app = create_router(Arc::new(state));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
