//! Scrape use case: walk the catalog, fan products out to the queue, export a CSV snapshot

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::crawling::driver::PageDriver;
use crate::crawling::orchestrator::{ScrapeOrchestrator, ScrapeReport};
use crate::infrastructure::csv_export::{CsvExporter, ExportError};
use crate::infrastructure::queue::ProductPublisher;

/// Outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub scrape: ScrapeReport,
    pub published: usize,
    pub failed: usize,
    pub export_path: Option<PathBuf>,
}

pub struct ScrapePipeline {
    orchestrator: ScrapeOrchestrator,
    publisher: Arc<dyn ProductPublisher>,
    exporter: Option<CsvExporter>,
}

impl ScrapePipeline {
    pub fn new(orchestrator: ScrapeOrchestrator, publisher: Arc<dyn ProductPublisher>) -> Self {
        Self {
            orchestrator,
            publisher,
            exporter: None,
        }
    }

    #[must_use]
    pub fn with_exporter(mut self, exporter: CsvExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Scrape, then publish every product, then export.
    ///
    /// Publish and export failures are logged and counted; they never abort
    /// the run or discard already-scraped products.
    pub async fn run<D>(&mut self, driver: &mut D, cancel: &CancellationToken) -> PipelineReport
    where
        D: PageDriver + ?Sized,
    {
        let scrape = self.orchestrator.run(driver, cancel).await;
        info!("Scraped {} unique products, publishing", scrape.products.len());

        let mut report = PipelineReport::default();
        for product in &scrape.products {
            match self.publisher.publish(product).await {
                Ok(()) => report.published += 1,
                Err(e) => {
                    error!("Failed to publish '{}': {}", product.title, e);
                    report.failed += 1;
                }
            }
        }
        info!("📤 Published {} products ({} failed)", report.published, report.failed);

        if let Some(exporter) = &self.exporter {
            match exporter.export(&scrape.products) {
                Ok(path) => report.export_path = Some(path),
                Err(ExportError::Empty) => warn!("Nothing scraped, CSV export skipped"),
                Err(e) => error!("CSV export failed: {}", e),
            }
        }

        report.scrape = scrape;
        report
    }
}
