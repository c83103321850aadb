//! Scraper process: walk the catalog once, publish, export, exit.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pc_scraper::application::ScrapePipeline;
use pc_scraper::crawling::{CategoryWalker, ExtractorSelectors, PageExtractor, ScrapeOrchestrator};
use pc_scraper::infrastructure::{
    AmqpPublisher, AppConfig, ChromiumDriver, CsvExporter, ScraperMetrics, init_logging_with_config, shutdown_signal,
    spawn_metrics_server,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging_with_config(config.logging.clone())?;
    config.log_summary();

    info!("🚀 Starting scraper ({} categories)", config.categories.len());

    let cancel = CancellationToken::new();
    let metrics = ScraperMetrics::new();
    let metrics_server = spawn_metrics_server(config.metrics.scraper_addr, metrics.clone(), cancel.clone());

    let publisher = Arc::new(
        AmqpPublisher::connect(&config.queue.url, &config.queue.queue_name)
            .await
            .context("Failed to connect publisher")?,
    );

    let mut driver = ChromiumDriver::launch(&config.scraper)
        .await
        .context("Failed to launch browser")?;

    let extractor = PageExtractor::new(&ExtractorSelectors::default())?;
    let walker = CategoryWalker::new(config.scraper.clone(), extractor, Arc::clone(&metrics));
    let orchestrator = ScrapeOrchestrator::new(config.categories.clone(), walker);
    let mut pipeline = ScrapePipeline::new(orchestrator, publisher.clone());
    if config.export.enabled {
        pipeline = pipeline.with_exporter(CsvExporter::new(&config.export.directory));
    }

    let scrape_cancel = cancel.child_token();
    let watchdog = spawn_watchdog(scrape_cancel.clone(), config.scraper.run_timeout());

    let report = pipeline.run(&mut driver, &scrape_cancel).await;
    watchdog.abort();
    drop(pipeline);

    if report.scrape.cancelled {
        warn!("Run ended early; partial results were published");
    }
    info!(
        scraped = report.scrape.products.len(),
        published = report.published,
        failed = report.failed,
        duplicates = report.scrape.duplicates(),
        "✅ Scrape finished"
    );
    for summary in &report.scrape.categories {
        info!(
            "  {}: {} products, {} pages, stopped: {}",
            summary.category,
            summary.products,
            summary.pages_visited,
            summary.stop_reason.as_str()
        );
    }

    driver.close().await;
    match Arc::try_unwrap(publisher) {
        Ok(publisher) => publisher.close().await,
        Err(_) => warn!("Publisher still shared at shutdown, leaving connection to drop"),
    }
    cancel.cancel();
    if let Err(e) = metrics_server.await {
        error!("Metrics server task failed: {}", e);
    }
    Ok(())
}

/// Cancel the scrape on Ctrl+C, SIGTERM, or when the run deadline passes.
fn spawn_watchdog(cancel: CancellationToken, deadline: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown_signal() => warn!("Shutdown signal received, stopping after current page"),
            () = tokio::time::sleep(deadline) => warn!("Run deadline of {}s reached", deadline.as_secs()),
        }
        cancel.cancel();
    })
}
