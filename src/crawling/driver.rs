//! Seams between the walk loop and the browser
//!
//! The walker only needs four page operations and a way to recognise an
//! anti-bot interstitial. Both are traits so the loop can be driven by a real
//! Chromium session or by scripted pages in tests.

use async_trait::async_trait;

use crate::crawling::error::CrawlError;

/// A single browser tab the walker navigates.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate and wait until the DOM content is loaded.
    async fn goto(&mut self, url: &str) -> Result<(), CrawlError>;

    /// Current document title.
    async fn title(&mut self) -> Result<String, CrawlError>;

    /// Scroll the viewport vertically.
    async fn scroll_by(&mut self, pixels: u32) -> Result<(), CrawlError>;

    /// Rendered DOM serialized as HTML.
    async fn html(&mut self) -> Result<String, CrawlError>;
}

/// Decides from a page title whether an anti-bot challenge is being shown.
pub trait InterstitialDetector: Send + Sync {
    fn is_interstitial(&self, title: &str) -> bool;
}

impl<F> InterstitialDetector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_interstitial(&self, title: &str) -> bool {
        self(title)
    }
}

/// Matches Cloudflare's challenge page titles.
#[derive(Debug, Clone)]
pub struct TitleMarkerDetector {
    markers: Vec<String>,
}

impl TitleMarkerDetector {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for TitleMarkerDetector {
    fn default() -> Self {
        Self::new(["Just a moment", "Cloudflare"])
    }
}

impl InterstitialDetector for TitleMarkerDetector {
    fn is_interstitial(&self, title: &str) -> bool {
        self.markers.iter().any(|marker| title.contains(marker.as_str()))
    }
}
