//! Chromium page driver
//!
//! Real-browser implementation of [`PageDriver`] over the DevTools protocol.
//! The listing pages are rendered client-side, so a plain HTTP fetch would
//! see an empty shell; a full browser session is required.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::crawling::driver::PageDriver;
use crate::crawling::error::CrawlError;
use crate::infrastructure::config::ScraperConfig;

/// Hides `navigator.webdriver`, which the store's bot shield checks.
const AUTOMATION_FLAG: &str = "--disable-blink-features=AutomationControlled";

pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank tab configured with the run's user agent.
    pub async fn launch(settings: &ScraperConfig) -> Result<Self, CrawlError> {
        let mut builder = BrowserConfig::builder()
            .arg(AUTOMATION_FLAG)
            .arg(format!("--user-agent={}", settings.user_agent))
            .window_size(1366, 768);
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(CrawlError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlError::BrowserLaunch(e.to_string()))?;

        info!("🌐 Chromium launched (headless: {})", settings.headless);
        Ok(Self { browser, page, handler })
    }

    /// Close the browser and stop the protocol handler.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Browser process wait failed: {}", e);
        }
        self.handler.abort();
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn goto(&mut self, url: &str) -> Result<(), CrawlError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| CrawlError::navigation(url, e))
    }

    async fn title(&mut self) -> Result<String, CrawlError> {
        self.page
            .get_title()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| CrawlError::driver("title", e))
    }

    async fn scroll_by(&mut self, pixels: u32) -> Result<(), CrawlError> {
        self.page
            .evaluate(format!("window.scrollBy(0, {pixels})"))
            .await
            .map(|_| ())
            .map_err(|e| CrawlError::driver("scroll", e))
    }

    async fn html(&mut self) -> Result<String, CrawlError> {
        self.page
            .content()
            .await
            .map_err(|e| CrawlError::driver("content", e))
    }
}
