//! Frameforge Dispatch - Main Entry Point
//! Queue consumer feeding a fixed pool of image generation workers

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use frameforge_core::application::{
    shutdown_channel, QueueConsumer, RecoveryService, WorkerDeps, WorkerPool,
};
use frameforge_core::port::id_provider::UuidProvider;
use frameforge_core::port::time_provider::SystemTimeProvider;
use frameforge_core::port::{MessageBroker, TimeProvider};
use frameforge_infra_http::{build_client, HttpImageGenerator, HttpImageStorage};
use frameforge_infra_sqlite::{
    create_pool, run_migrations, SqliteItemRepository, SqliteJobRepository, SqliteMessageBroker,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    let _log_guard = telemetry::init_logging()?;
    info!("Frameforge Dispatch v{} starting...", VERSION);

    // 2. Configuration
    let config = DaemonConfig::load()?;
    info!(
        db_path = %config.db_path,
        queue = %config.queue_name,
        pool_size = config.pool_size,
        "Configuration loaded"
    );

    // 3. Database
    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !config.db_path.contains(":memory:") && !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let db = create_pool(&config.db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&db)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let job_repo = Arc::new(SqliteJobRepository::new(db.clone()));
    let broker: Arc<dyn MessageBroker> =
        Arc::new(SqliteMessageBroker::new(db.clone(), time_provider.clone()));

    let http = build_client(config.http_timeout())
        .map_err(|e| anyhow::anyhow!("HTTP client setup failed: {}", e))?;
    let deps = WorkerDeps {
        job_repo: job_repo.clone(),
        item_repo: Arc::new(SqliteItemRepository::new(db.clone())),
        generator: Arc::new(HttpImageGenerator::new(http.clone(), &config.generator_url)),
        storage: Arc::new(HttpImageStorage::new(http, &config.storage_url)),
        id_provider: Arc::new(UuidProvider),
        time_provider,
    };

    // 5. Crash recovery: return deliveries stranded by a previous run
    let recovery = RecoveryService::new(broker.clone(), job_repo);
    match recovery.recover(&config.queue_name).await {
        Ok(report) => info!(
            requeued = report.requeued,
            processing_jobs = report.processing_jobs,
            "Crash recovery completed"
        ),
        Err(e) => error!(error = %e, "Crash recovery failed"),
    }

    // 6. Worker pool
    let pool = WorkerPool::initialize(config.pool_config(), deps)
        .await
        .map_err(|e| anyhow::anyhow!("Worker pool start failed: {}", e))?;

    // 7. Queue consumer
    let consumer = QueueConsumer::new(broker, pool.clone(), config.queue_name.clone());
    consumer
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("Queue connect failed: {}", e))?;

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let consumer_task = consumer.clone();
    let consumer_handle = tokio::spawn(async move { consumer_task.consume(shutdown_rx).await });

    info!("System ready. Waiting for image requests...");
    info!("Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown: stop consuming, let in-flight items settle, then
    // stop the workers
    shutdown_tx.shutdown();
    match consumer_handle.await {
        Ok(Ok(stats)) => info!(acked = stats.acked, requeued = stats.requeued, "Consumer stopped"),
        Ok(Err(e)) => error!(error = %e, "Consumer failed"),
        Err(e) => error!(error = %e, "Consumer task panicked"),
    }
    if let Err(e) = consumer.close().await {
        warn!(error = %e, "Failed to close broker channel");
    }
    pool.shutdown().await;
    db.close().await;

    info!("Shutdown complete.");
    Ok(())
}
