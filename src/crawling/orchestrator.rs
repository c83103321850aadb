//! Scrape orchestrator
//!
//! Runs the configured categories one after another on a single page driver,
//! sharing one dedup ledger for the whole run.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::crawling::dedup::DedupLedger;
use crate::crawling::driver::PageDriver;
use crate::crawling::walker::{CategoryWalker, StopReason, pause};
use crate::domain::category::CategoryConfig;
use crate::domain::product::Product;

/// Per-category summary kept after the products are aggregated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: String,
    pub products: usize,
    pub pages_visited: u32,
    pub duplicates: u32,
    pub stop_reason: StopReason,
}

/// Everything one run produced, in category, page, card order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeReport {
    pub products: Vec<Product>,
    pub categories: Vec<CategorySummary>,
    pub cancelled: bool,
}

impl ScrapeReport {
    #[must_use]
    pub fn duplicates(&self) -> u32 {
        self.categories.iter().map(|c| c.duplicates).sum()
    }
}

pub struct ScrapeOrchestrator {
    categories: Vec<CategoryConfig>,
    walker: CategoryWalker,
}

impl ScrapeOrchestrator {
    #[must_use]
    pub const fn new(categories: Vec<CategoryConfig>, walker: CategoryWalker) -> Self {
        Self { categories, walker }
    }

    pub async fn run<D>(&mut self, driver: &mut D, cancel: &CancellationToken) -> ScrapeReport
    where
        D: PageDriver + ?Sized,
    {
        let mut ledger = DedupLedger::new();
        let mut report = ScrapeReport::default();
        let delay = self.walker.settings().category_delay();
        let total = self.categories.len();

        for (index, category) in self.categories.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Cancellation requested, skipping remaining categories");
                report.cancelled = true;
                break;
            }

            let outcome = self.walker.walk(driver, category, &mut ledger, cancel).await;
            if outcome.stop_reason == StopReason::Cancelled {
                report.cancelled = true;
            }

            report.categories.push(CategorySummary {
                category: outcome.category,
                products: outcome.products.len(),
                pages_visited: outcome.pages_visited,
                duplicates: outcome.duplicates,
                stop_reason: outcome.stop_reason,
            });
            report.products.extend(outcome.products);

            if index + 1 < total {
                info!("⏸️ Pausing {}s before next category", delay.as_secs());
                pause(delay, cancel).await;
            }
        }

        if cancel.is_cancelled() {
            report.cancelled = true;
        }

        info!(
            products = report.products.len(),
            duplicates = report.duplicates(),
            unique_fingerprints = ledger.len(),
            "🏁 Scrape run complete"
        );
        report
    }
}
