//! In-memory page driver serving canned listing pages
//!
//! Used to exercise the walk loop without a browser: each URL maps to a title
//! and a sequence of HTML snapshots returned by successive `html()` calls
//! (the last snapshot repeats). Unknown URLs fail navigation.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::crawling::driver::PageDriver;
use crate::crawling::error::CrawlError;

#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    pub title: String,
    pub snapshots: Vec<String>,
}

impl ScriptedPage {
    pub fn new(title: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snapshots: vec![html.into()],
        }
    }

    /// Append a snapshot returned by the next `html()` read.
    #[must_use]
    pub fn then(mut self, html: impl Into<String>) -> Self {
        self.snapshots.push(html.into());
        self
    }
}

#[derive(Debug, Default)]
pub struct ScriptedDriver {
    pages: HashMap<String, ScriptedPage>,
    current: Option<String>,
    reads: HashMap<String, usize>,
    /// Every URL passed to `goto`, in order.
    pub visited: Vec<String>,
    /// Every scroll distance requested, in order.
    pub scrolls: Vec<u32>,
}

impl ScriptedDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, page: ScriptedPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    fn current_page(&self, operation: &str) -> Result<(&str, &ScriptedPage), CrawlError> {
        let url = self
            .current
            .as_deref()
            .ok_or_else(|| CrawlError::driver(operation, "no page loaded"))?;
        let page = self
            .pages
            .get(url)
            .ok_or_else(|| CrawlError::driver(operation, "page vanished"))?;
        Ok((url, page))
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn goto(&mut self, url: &str) -> Result<(), CrawlError> {
        self.visited.push(url.to_string());
        if self.pages.contains_key(url) {
            self.current = Some(url.to_string());
            Ok(())
        } else {
            self.current = None;
            Err(CrawlError::navigation(url, "net::ERR_NAME_NOT_RESOLVED"))
        }
    }

    async fn title(&mut self) -> Result<String, CrawlError> {
        Ok(self.current_page("title")?.1.title.clone())
    }

    async fn scroll_by(&mut self, pixels: u32) -> Result<(), CrawlError> {
        self.scrolls.push(pixels);
        Ok(())
    }

    async fn html(&mut self) -> Result<String, CrawlError> {
        let (url, page) = self.current_page("html")?;
        let url = url.to_string();
        let index = self.reads.get(&url).copied().unwrap_or(0);
        let snapshot = page
            .snapshots
            .get(index)
            .or_else(|| page.snapshots.last())
            .cloned()
            .ok_or_else(|| CrawlError::driver("html", "page has no content"))?;
        self.reads.insert(url, index + 1);
        Ok(snapshot)
    }
}
