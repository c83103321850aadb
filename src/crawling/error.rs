//! Crawl error types
//!
//! Card-level mismatches are never errors; these cover the page and browser
//! failures that end a category walk or prevent one from starting.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrawlError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Navigation to {url} timed out after {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },

    #[error("Browser operation '{operation}' failed: {reason}")]
    Driver { operation: String, reason: String },

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Invalid selector or pattern '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid listing URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl CrawlError {
    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn driver(operation: &str, reason: impl ToString) -> Self {
        Self::Driver {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure happened while loading a listing page.
    #[must_use]
    pub const fn is_navigation(&self) -> bool {
        matches!(self, Self::Navigation { .. } | Self::NavigationTimeout { .. })
    }
}
