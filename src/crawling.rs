//! Scraping orchestration core
//!
//! The orchestrator walks categories in sequence; the walker drives one
//! category page by page through a [`PageDriver`]; the extractor turns each
//! rendered page into products, filtered through the run's dedup ledger.

pub mod dedup;
pub mod driver;
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod scripted;
pub mod walker;

pub use dedup::DedupLedger;
pub use driver::{InterstitialDetector, PageDriver, TitleMarkerDetector};
pub use error::CrawlError;
pub use extractor::{ExtractorSelectors, PageExtraction, PageExtractor};
pub use orchestrator::{CategorySummary, ScrapeOrchestrator, ScrapeReport};
pub use walker::{CategoryOutcome, CategoryWalker, StopReason};
