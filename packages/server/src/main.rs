use std::sync::Arc;

use anyhow::Context;
use common::{DeliveryMode, EventBus};
use mq::{MemoryQueueStore, QueueKeys, QueueStore, RedisQueueStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::services::plagiarism::HttpSimilarityService;
use server::state::AppState;
use server::{build_router, consumers, database, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    seed::ensure_indexes(&db)
        .await
        .context("Failed to create indexes")?;

    let queue: Arc<dyn QueueStore> = if config.queue.enabled {
        Arc::new(
            RedisQueueStore::connect(&config.queue)
                .await
                .context("Failed to connect to queue store")?,
        )
    } else {
        warn!("Queue disabled, using in-process store; no worker will pick up jobs");
        Arc::new(MemoryQueueStore::new(QueueKeys::new(
            config.queue.key_prefix.clone(),
        )))
    };

    let similarity = Arc::new(
        HttpSimilarityService::new(&config.plagiarism)
            .context("Failed to build similarity client")?,
    );

    let events = Arc::new(EventBus::new(DeliveryMode::Detached));
    consumers::register(&events, db.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        db,
        config,
        queue,
        events,
        similarity,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
