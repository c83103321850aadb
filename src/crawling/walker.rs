//! Category walker
//!
//! Walks the listing pages of one category as an explicit state machine:
//!
//! ```text
//! Navigating -> CheckingInterstitial -> Extracting -> Waiting -> Navigating ...
//!      |                                    |             |
//!      +------------- Stopped(reason) <-----+-------------+
//! ```
//!
//! Page-level failures never escalate: a failed navigation or a page that
//! stays empty ends the category with whatever was collected so far.
//! Cancellation is observed at the `Navigating` boundary; sleeps end early
//! when it fires so shutdown does not wait out a long pause.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::crawling::dedup::DedupLedger;
use crate::crawling::driver::{InterstitialDetector, PageDriver, TitleMarkerDetector};
use crate::crawling::error::CrawlError;
use crate::crawling::extractor::PageExtractor;
use crate::domain::category::CategoryConfig;
use crate::domain::product::Product;
use crate::infrastructure::config::ScraperConfig;
use crate::infrastructure::metrics::{ScraperMetrics, page_status};

/// Why a category walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    PageLimit,
    EmptyPage,
    NavigationFailed,
    Cancelled,
}

impl StopReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PageLimit => "page_limit",
            Self::EmptyPage => "empty_page",
            Self::NavigationFailed => "navigation_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of walking one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryOutcome {
    pub category: String,
    pub products: Vec<Product>,
    /// Pages whose navigation succeeded.
    pub pages_visited: u32,
    pub duplicates: u32,
    pub stop_reason: StopReason,
}

#[derive(Debug)]
enum WalkState {
    Navigating { page: u32 },
    CheckingInterstitial { page: u32, started: Instant },
    Extracting { page: u32, started: Instant },
    Waiting { page: u32 },
    Stopped(StopReason),
}

pub struct CategoryWalker {
    settings: ScraperConfig,
    extractor: PageExtractor,
    detector: Arc<dyn InterstitialDetector>,
    metrics: Arc<ScraperMetrics>,
    rng: fastrand::Rng,
}

impl CategoryWalker {
    pub fn new(settings: ScraperConfig, extractor: PageExtractor, metrics: Arc<ScraperMetrics>) -> Self {
        Self {
            settings,
            extractor,
            detector: Arc::new(TitleMarkerDetector::default()),
            metrics,
            rng: fastrand::Rng::new(),
        }
    }

    #[must_use]
    pub fn with_detector(mut self, detector: impl InterstitialDetector + 'static) -> Self {
        self.detector = Arc::new(detector);
        self
    }

    /// Fix the jitter sequence (scroll distances and waits).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &ScraperConfig {
        &self.settings
    }

    /// Walk pages `1..=max_pages` of `category`, recording accepted products in `ledger`.
    pub async fn walk<D>(
        &mut self,
        driver: &mut D,
        category: &CategoryConfig,
        ledger: &mut DedupLedger,
        cancel: &CancellationToken,
    ) -> CategoryOutcome
    where
        D: PageDriver + ?Sized,
    {
        info!("🔎 Walking category {} ({})", category.name, category.url);

        let mut outcome = CategoryOutcome {
            category: category.name.clone(),
            products: Vec::new(),
            pages_visited: 0,
            duplicates: 0,
            stop_reason: StopReason::PageLimit,
        };
        let mut state = WalkState::Navigating { page: 1 };

        loop {
            state = match state {
                WalkState::Navigating { page } => {
                    self.navigate(driver, category, page, cancel, &mut outcome).await
                }
                WalkState::CheckingInterstitial { page, started } => {
                    self.check_interstitial(driver, category, page, cancel).await;
                    WalkState::Extracting { page, started }
                }
                WalkState::Extracting { page, started } => {
                    self.extract(driver, category, page, started, ledger, cancel, &mut outcome)
                        .await
                }
                WalkState::Waiting { page } => {
                    if page >= self.settings.max_pages {
                        WalkState::Stopped(StopReason::PageLimit)
                    } else {
                        let wait = self.jitter(self.settings.wait_min(), self.settings.wait_max());
                        debug!("Waiting {:.1}s before page {}", wait.as_secs_f64(), page + 1);
                        pause(wait, cancel).await;
                        WalkState::Navigating { page: page + 1 }
                    }
                }
                WalkState::Stopped(reason) => {
                    outcome.stop_reason = reason;
                    break;
                }
            };
        }

        info!(
            category = %outcome.category,
            products = outcome.products.len(),
            pages = outcome.pages_visited,
            duplicates = outcome.duplicates,
            stop_reason = outcome.stop_reason.as_str(),
            "✅ Category {} finished",
            outcome.category
        );
        outcome
    }

    async fn navigate<D>(
        &mut self,
        driver: &mut D,
        category: &CategoryConfig,
        page: u32,
        cancel: &CancellationToken,
        outcome: &mut CategoryOutcome,
    ) -> WalkState
    where
        D: PageDriver + ?Sized,
    {
        if cancel.is_cancelled() {
            warn!("Scrape cancelled before {} page {}", category.name, page);
            return WalkState::Stopped(StopReason::Cancelled);
        }
        if page > self.settings.max_pages {
            return WalkState::Stopped(StopReason::PageLimit);
        }

        let url = match category.page_url(page) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid listing URL for {}: {}", category.name, e);
                self.metrics.record_page(&category.name, page_status::ERROR);
                return WalkState::Stopped(StopReason::NavigationFailed);
            }
        };

        let started = Instant::now();
        let nav_timeout = self.settings.navigation_timeout();
        let result = match timeout(nav_timeout, driver.goto(url.as_str())).await {
            Ok(result) => result,
            Err(_) => Err(CrawlError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: nav_timeout.as_secs(),
            }),
        };

        match result {
            Ok(()) => {
                outcome.pages_visited += 1;
                WalkState::CheckingInterstitial { page, started }
            }
            Err(e) => {
                error!("❌ {} page {}: {}", category.name, page, e);
                self.metrics.record_page(&category.name, page_status::ERROR);
                WalkState::Stopped(StopReason::NavigationFailed)
            }
        }
    }

    async fn check_interstitial<D>(
        &mut self,
        driver: &mut D,
        category: &CategoryConfig,
        page: u32,
        cancel: &CancellationToken,
    ) where
        D: PageDriver + ?Sized,
    {
        let title = match driver.title().await {
            Ok(title) => title,
            Err(e) => {
                debug!("Could not read title of {} page {}: {}", category.name, page, e);
                return;
            }
        };

        if self.detector.is_interstitial(&title) {
            let wait = self.settings.interstitial_wait();
            warn!(
                "🛡️ Anti-bot interstitial on {} page {} ({:?}), waiting {}s",
                category.name,
                page,
                title,
                wait.as_secs()
            );
            self.metrics.cloudflare_detections.inc();
            pause(wait, cancel).await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn extract<D>(
        &mut self,
        driver: &mut D,
        category: &CategoryConfig,
        page: u32,
        started: Instant,
        ledger: &mut DedupLedger,
        cancel: &CancellationToken,
        outcome: &mut CategoryOutcome,
    ) -> WalkState
    where
        D: PageDriver + ?Sized,
    {
        self.perturb(driver, cancel).await;

        let mut html = match driver.html().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not read {} page {}: {}", category.name, page, e);
                self.metrics.record_page(&category.name, page_status::ERROR);
                return WalkState::Waiting { page };
            }
        };

        if self.extractor.count_cards(&html) == 0 {
            debug!("No cards on {} page {} yet, retrying once", category.name, page);
            pause(self.settings.empty_page_retry_delay(), cancel).await;

            // An unreadable page on retry counts as still empty.
            html = match driver.html().await {
                Ok(html) => html,
                Err(e) => {
                    debug!("Could not re-read {} page {}: {}", category.name, page, e);
                    String::new()
                }
            };

            if self.extractor.count_cards(&html) == 0 {
                warn!("⚠️ {} page {} has no products, stopping category", category.name, page);
                self.metrics.record_page(&category.name, page_status::EMPTY);
                return WalkState::Stopped(StopReason::EmptyPage);
            }
        }

        let extraction = self.extractor.extract(&html, category, page, ledger);
        let found = extraction.products.len();

        self.metrics
            .page_duration
            .observe(&[&category.name], started.elapsed());
        self.metrics.record_page(&category.name, page_status::SUCCESS);
        self.metrics
            .products_scraped
            .add(&[&category.name], found as u64);
        self.metrics
            .duplicates_skipped
            .add(&[&category.name], u64::from(extraction.duplicates));

        info!(
            "📄 {} page {}: {} products, {} duplicates skipped",
            category.name, page, found, extraction.duplicates
        );

        outcome.duplicates += extraction.duplicates;
        outcome.products.extend(extraction.products);
        WalkState::Waiting { page }
    }

    /// Scroll a random distance and idle briefly, like a reader skimming the list.
    async fn perturb<D>(&mut self, driver: &mut D, cancel: &CancellationToken)
    where
        D: PageDriver + ?Sized,
    {
        let min = self.settings.scroll_min_px;
        let pixels = self.rng.u32(min..=self.settings.scroll_max_px.max(min));
        if let Err(e) = driver.scroll_by(pixels).await {
            debug!("Scroll failed: {}", e);
        }
        let idle = self.jitter(self.settings.pause_min(), self.settings.pause_max());
        pause(idle, cancel).await;
    }

    fn jitter(&mut self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        min + (max - min).mul_f64(self.rng.f64())
    }
}

/// Sleep for `duration`, returning early if `cancel` fires.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) {
    tokio::select! {
        () = tokio::time::sleep(duration) => {}
        () = cancel.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawling::extractor::ExtractorSelectors;
    use crate::crawling::scripted::{ScriptedDriver, ScriptedPage};

    const GPU_URL: &str = "https://shop.test/placa-de-video";

    fn gpu() -> CategoryConfig {
        CategoryConfig::new("GPU", GPU_URL, "placa")
    }

    fn card(title: &str, price: &str) -> String {
        format!(r#"<div class="MuiCard-root"><h2>{title}</h2><span>{price}</span></div>"#)
    }

    fn listing(cards: &[String]) -> String {
        format!("<html><head><title>Placas</title></head><body>{}</body></html>", cards.concat())
    }

    fn page_url(page: u32) -> String {
        format!("{GPU_URL}?page={page}")
    }

    fn settings(max_pages: u32) -> ScraperConfig {
        ScraperConfig {
            max_pages,
            ..ScraperConfig::default()
        }
    }

    fn walker(max_pages: u32, metrics: Arc<ScraperMetrics>) -> CategoryWalker {
        let extractor = PageExtractor::new(&ExtractorSelectors::default()).unwrap();
        CategoryWalker::new(settings(max_pages), extractor, metrics).with_seed(7)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_empty_page() {
        let metrics = ScraperMetrics::new();
        let mut driver = ScriptedDriver::new()
            .with_page(
                page_url(1),
                ScriptedPage::new(
                    "Placas",
                    listing(&[
                        card("Placa de Video A", "R$ 100,00"),
                        card("Placa de Video B", "R$ 200,00"),
                        card("Placa de Video C", "R$ 300,00"),
                    ]),
                ),
            )
            .with_page(page_url(2), ScriptedPage::new("Placas", listing(&[])));
        let mut ledger = DedupLedger::new();

        let outcome = walker(2, Arc::clone(&metrics))
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(outcome.products.len(), 3);
        assert_eq!(outcome.stop_reason, StopReason::EmptyPage);
        assert_eq!(outcome.pages_visited, 2);
        assert_eq!(driver.visited, vec![page_url(1), page_url(2)]);
        assert_eq!(metrics.pages_processed.get(&["GPU", page_status::SUCCESS]), 1);
        assert_eq!(metrics.pages_processed.get(&["GPU", page_status::EMPTY]), 1);
        assert_eq!(metrics.products_scraped.get(&["GPU"]), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_page_is_retried_once() {
        let mut driver = ScriptedDriver::new().with_page(
            page_url(1),
            ScriptedPage::new("Placas", listing(&[])).then(listing(&[card("Placa de Video A", "R$ 100,00")])),
        );
        let mut ledger = DedupLedger::new();

        let outcome = walker(1, ScraperMetrics::new())
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.stop_reason, StopReason::PageLimit);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_failure_keeps_partial_results() {
        let metrics = ScraperMetrics::new();
        let mut driver = ScriptedDriver::new().with_page(
            page_url(1),
            ScriptedPage::new("Placas", listing(&[card("Placa de Video A", "R$ 100,00")])),
        );
        let mut ledger = DedupLedger::new();

        let outcome = walker(5, Arc::clone(&metrics))
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.stop_reason, StopReason::NavigationFailed);
        assert_eq!(outcome.pages_visited, 1);
        assert_eq!(metrics.pages_processed.get(&["GPU", page_status::ERROR]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn walks_every_page_up_to_the_limit() {
        let mut driver = ScriptedDriver::new();
        for page in 1..=3 {
            driver = driver.with_page(
                page_url(page),
                ScriptedPage::new("Placas", listing(&[card(&format!("Placa de Video P{page}"), "R$ 10,00")])),
            );
        }
        let mut ledger = DedupLedger::new();

        let outcome = walker(3, ScraperMetrics::new())
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(outcome.stop_reason, StopReason::PageLimit);
        assert_eq!(outcome.products.iter().map(|p| p.page).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(driver.scrolls.len(), 3);
        assert!(driver.scrolls.iter().all(|px| (300..=800).contains(px)));
    }

    #[tokio::test(start_paused = true)]
    async fn interstitial_waits_and_is_counted() {
        let metrics = ScraperMetrics::new();
        let mut driver = ScriptedDriver::new().with_page(
            page_url(1),
            ScriptedPage::new("Just a moment...", listing(&[card("Placa de Video A", "R$ 100,00")])),
        );
        let mut ledger = DedupLedger::new();
        let started = Instant::now();

        let outcome = walker(1, Arc::clone(&metrics))
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(metrics.cloudflare_detections.get(), 1);
        assert_eq!(outcome.products.len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_stops_before_navigation() {
        let mut driver = ScriptedDriver::new();
        let mut ledger = DedupLedger::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = walker(5, ScraperMetrics::new())
            .walk(&mut driver, &gpu(), &mut ledger, &cancel)
            .await;

        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert!(outcome.products.is_empty());
        assert!(driver.visited.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn custom_detector_is_consulted() {
        let metrics = ScraperMetrics::new();
        let mut driver = ScriptedDriver::new().with_page(
            page_url(1),
            ScriptedPage::new("Verifying you are human", listing(&[card("Placa de Video A", "R$ 1,00")])),
        );
        let mut ledger = DedupLedger::new();

        walker(1, Arc::clone(&metrics))
            .with_detector(|title: &str| title.starts_with("Verifying"))
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(metrics.cloudflare_detections.get(), 1);
    }

    /// Serves an empty listing once, then fails every read. `goto` can be made to hang.
    #[derive(Default)]
    struct UnreliableDriver {
        hang_on_goto: bool,
        visited: Vec<String>,
        reads: usize,
    }

    #[async_trait::async_trait]
    impl PageDriver for UnreliableDriver {
        async fn goto(&mut self, url: &str) -> Result<(), CrawlError> {
            self.visited.push(url.to_string());
            if self.hang_on_goto {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn title(&mut self) -> Result<String, CrawlError> {
            Ok("Placas".to_string())
        }

        async fn scroll_by(&mut self, _pixels: u32) -> Result<(), CrawlError> {
            Ok(())
        }

        async fn html(&mut self) -> Result<String, CrawlError> {
            self.reads += 1;
            if self.reads == 1 {
                Ok(listing(&[]))
            } else {
                Err(CrawlError::driver("html", "target closed"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_page_limit_visits_nothing() {
        let mut driver = ScriptedDriver::new().with_page(
            page_url(1),
            ScriptedPage::new("Placas", listing(&[card("Placa de Video A", "R$ 100,00")])),
        );
        let mut ledger = DedupLedger::new();

        let outcome = walker(0, ScraperMetrics::new())
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(outcome.stop_reason, StopReason::PageLimit);
        assert!(outcome.products.is_empty());
        assert!(driver.visited.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reread_of_empty_page_stops_category() {
        let metrics = ScraperMetrics::new();
        let mut driver = UnreliableDriver::default();
        let mut ledger = DedupLedger::new();

        let outcome = walker(3, Arc::clone(&metrics))
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(outcome.stop_reason, StopReason::EmptyPage);
        assert_eq!(driver.visited.len(), 1);
        assert_eq!(metrics.pages_processed.get(&["GPU", page_status::EMPTY]), 1);
        assert_eq!(metrics.pages_processed.get(&["GPU", page_status::ERROR]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_timeout_stops_category() {
        let metrics = ScraperMetrics::new();
        let mut driver = UnreliableDriver {
            hang_on_goto: true,
            ..UnreliableDriver::default()
        };
        let mut ledger = DedupLedger::new();
        let started = Instant::now();

        let outcome = walker(3, Arc::clone(&metrics))
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(outcome.stop_reason, StopReason::NavigationFailed);
        assert_eq!(outcome.pages_visited, 0);
        assert_eq!(metrics.pages_processed.get(&["GPU", page_status::ERROR]), 1);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn inverted_scroll_range_uses_minimum() {
        let settings = ScraperConfig {
            max_pages: 1,
            scroll_min_px: 500,
            scroll_max_px: 100,
            ..ScraperConfig::default()
        };
        let extractor = PageExtractor::new(&ExtractorSelectors::default()).unwrap();
        let mut driver = ScriptedDriver::new().with_page(
            page_url(1),
            ScriptedPage::new("Placas", listing(&[card("Placa de Video A", "R$ 100,00")])),
        );
        let mut ledger = DedupLedger::new();

        CategoryWalker::new(settings, extractor, ScraperMetrics::new())
            .walk(&mut driver, &gpu(), &mut ledger, &CancellationToken::new())
            .await;

        assert_eq!(driver.scrolls, vec![500]);
    }
}
