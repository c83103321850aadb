//! Category configuration: where to scrape and which titles to keep

use serde::{Deserialize, Serialize};
use url::Url;

/// One catalog category to walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Unique label, e.g. `GPU`.
    pub name: String,
    /// Listing URL without the page parameter.
    pub url: String,
    /// Substring every accepted title must contain (case-insensitive).
    pub filter: String,
    /// Optional allow-list; when non-empty a title must contain one of these.
    #[serde(default)]
    pub targets: Vec<String>,
}

impl CategoryConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            filter: filter.into(),
            targets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the title passes the target allow-list.
    ///
    /// An empty list accepts everything. Blank entries never match.
    #[must_use]
    pub fn matches_targets(&self, title: &str) -> bool {
        if self.targets.is_empty() {
            return true;
        }
        let lowered = title.to_lowercase();
        self.targets
            .iter()
            .map(|t| t.trim().to_lowercase())
            .any(|t| !t.is_empty() && lowered.contains(&t))
    }

    #[must_use]
    pub fn matches_filter(&self, title: &str) -> bool {
        title.to_lowercase().contains(&self.filter.to_lowercase())
    }

    /// Listing URL for a 1-based page number.
    pub fn page_url(&self, page: u32) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.url)?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }
}

/// Parse a comma-separated target list, dropping blank entries.
#[must_use]
pub fn parse_target_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}
