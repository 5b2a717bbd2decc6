//! Herald Notification Dispatcher - Main Entry Point

mod config;
mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use herald_api_rpc::{RpcDependencies, RpcHandler, RpcServer, RpcServerConfig};
use herald_core::application::worker::constants::GRACEFUL_SHUTDOWN_TIMEOUT;
use herald_core::application::{
    DeliveryWorker, NotificationService, RecoveryService, RetryConsumer, Scheduler,
};
use herald_core::port::{RetryQueue, SystemTimeProvider};
use herald_infra_sqlite::{
    create_pool, run_migrations, SqliteNotificationRepository, SqliteRetryQueue,
};
use herald_infra_webhook::HttpWebhookClient;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let _telemetry = telemetry::init()?;
    info!("Herald v{} starting...", VERSION);

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!(database_url = %config.database.url, "Initializing database...");
    let pool = create_pool(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // DI wiring
    let time_provider = Arc::new(SystemTimeProvider);
    let repo = Arc::new(SqliteNotificationRepository::new(
        pool.clone(),
        time_provider.clone(),
    ));
    let queue = Arc::new(
        SqliteRetryQueue::new(pool.clone(), config.queue.name.clone(), time_provider)
            .with_poll_interval(config.queue_poll_interval()),
    );
    let webhook = Arc::new(
        HttpWebhookClient::new(config.webhook.url.clone(), config.webhook_timeout())
            .map_err(|e| anyhow::anyhow!("Webhook client setup failed: {}", e))?,
    );

    info!("Running startup recovery...");
    let report = RecoveryService::new(repo.clone(), queue.clone())
        .recover()
        .await
        .map_err(|e| anyhow::anyhow!("Startup recovery failed: {}", e))?;
    info!(
        requeued = report.requeued,
        stuck_in_process = report.stuck_in_process.len(),
        "Startup recovery completed"
    );

    let worker = Arc::new(
        DeliveryWorker::new(repo.clone(), webhook, queue.clone())
            .with_batch_size(config.scheduler.batch_size),
    );
    let scheduler = Arc::new(Scheduler::with_interval(
        worker.clone(),
        config.scheduler_interval(),
    ));
    let consumer = Arc::new(RetryConsumer::new(queue.clone(), worker));

    // Every background loop runs in a child scope of this token
    let root = CancellationToken::new();

    if config.scheduler.autostart {
        scheduler.start(&root).await;
    }
    if config.consumer.autostart {
        consumer
            .start_consuming(&root, config.consumer.max_retries)
            .await;
    }

    info!("Starting JSON-RPC server...");
    let handler = RpcHandler::new(RpcDependencies {
        notifications: Arc::new(NotificationService::new(repo)),
        scheduler: scheduler.clone(),
        consumer: consumer.clone(),
        queue: queue.clone(),
        root: root.clone(),
        default_max_retries: config.consumer.max_retries,
    })
    .with_rate_limit(config.server.rate_limit_burst, config.server.rate_limit_per_sec);

    let rpc_config = RpcServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let (rpc_handle, rpc_addr) = RpcServer::new(rpc_config, Arc::new(handler))
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(rpc_addr = %rpc_addr, "System ready");
    info!("Press Ctrl+C to shutdown");

    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    root.cancel();
    if !scheduler.join(GRACEFUL_SHUTDOWN_TIMEOUT).await {
        warn!("Scheduler did not stop within the shutdown timeout");
    }
    if !consumer.join(GRACEFUL_SHUTDOWN_TIMEOUT).await {
        warn!("Retry consumer did not stop within the shutdown timeout");
    }

    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    // shared pool: the repository closes with it
    queue.close().await;

    info!("Shutdown complete.");
    Ok(())
}
