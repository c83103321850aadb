//! Consumer process: drain the product queue into PostgreSQL until signalled.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pc_scraper::application::PersistHandler;
use pc_scraper::infrastructure::{
    AmqpConsumer, AppConfig, ConsumerMetrics, DatabaseConnection, PgProductRepository,
    init_logging_with_config, shutdown_signal, spawn_metrics_server,
};

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    config.logging.json_format = true;
    init_logging_with_config(config.logging.clone())?;
    config.log_summary();

    info!("🚀 Starting consumer on queue '{}'", config.queue.queue_name);

    let cancel = CancellationToken::new();
    let metrics = ConsumerMetrics::new();
    let metrics_server = spawn_metrics_server(config.metrics.consumer_addr, metrics.clone(), cancel.clone());

    let database = DatabaseConnection::connect(&config.database).await?;
    database.migrate().await.context("Failed to prepare schema")?;

    let repository = Arc::new(PgProductRepository::new(database.pool().clone()));
    let handler = PersistHandler::new(repository, Arc::clone(&metrics));

    let consumer = AmqpConsumer::connect(&config.queue.url, &config.queue.queue_name, Arc::clone(&metrics))
        .await
        .context("Failed to connect consumer")?;

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown signal received");
        signal_cancel.cancel();
    });

    let result = consumer.run(&handler, &cancel).await;

    cancel.cancel();
    consumer.close().await;
    database.close().await;
    if let Err(e) = metrics_server.await {
        error!("Metrics server task failed: {}", e);
    }

    result.context("Consumer stopped with an error")?;
    info!("👋 Consumer stopped");
    Ok(())
}
