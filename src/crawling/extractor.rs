//! Listing page extraction
//!
//! Turns the rendered HTML of one listing page into products. The store is a
//! Material-UI app, so cards and titles are located through MUI class names
//! with a plain `h2` as the preferred title node. Everything here is
//! synchronous: the parsed document is never held across an await point.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::trace;

use crate::crawling::dedup::DedupLedger;
use crate::crawling::error::CrawlError;
use crate::domain::category::CategoryConfig;
use crate::domain::price::parse_price;
use crate::domain::product::{Fingerprint, Product};

/// CSS selectors and patterns used to read product cards.
#[derive(Debug, Clone)]
pub struct ExtractorSelectors {
    /// Selector matching one product card
    pub card: String,
    /// Preferred title node inside a card
    pub title: String,
    /// Title node used when the preferred one is absent or blank
    pub title_fallback: String,
    /// Regex an element's own text must match to be taken as the price
    pub price_pattern: String,
}

impl Default for ExtractorSelectors {
    fn default() -> Self {
        Self {
            card: ".MuiCard-root".to_string(),
            title: "h2".to_string(),
            title_fallback: ".MuiTypography-root".to_string(),
            price_pattern: r"R\$".to_string(),
        }
    }
}

/// Products taken from one page plus how many cards were already in the ledger.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageExtraction {
    pub products: Vec<Product>,
    pub duplicates: u32,
}

/// What happened to a single card.
#[derive(Debug, Clone, PartialEq)]
enum CardOutcome {
    Accepted(Product),
    Duplicate,
    Skipped(&'static str),
}

#[derive(Debug, Clone)]
pub struct PageExtractor {
    card: Selector,
    title: Selector,
    title_fallback: Selector,
    price_pattern: Regex,
}

impl PageExtractor {
    pub fn new(selectors: &ExtractorSelectors) -> Result<Self, CrawlError> {
        Ok(Self {
            card: compile_selector(&selectors.card)?,
            title: compile_selector(&selectors.title)?,
            title_fallback: compile_selector(&selectors.title_fallback)?,
            price_pattern: Regex::new(&selectors.price_pattern)
                .map_err(|e| CrawlError::invalid_selector(&selectors.price_pattern, e))?,
        })
    }

    /// Number of product cards currently rendered.
    #[must_use]
    pub fn count_cards(&self, html: &str) -> usize {
        Html::parse_document(html).select(&self.card).count()
    }

    /// Extract every acceptable card on the page, in render order.
    ///
    /// Accepted products are marked in `ledger`; cards whose fingerprint is
    /// already present are counted as duplicates and not emitted.
    pub fn extract(
        &self,
        html: &str,
        category: &CategoryConfig,
        page: u32,
        ledger: &mut DedupLedger,
    ) -> PageExtraction {
        let document = Html::parse_document(html);
        let mut extraction = PageExtraction::default();

        for (index, card) in document.select(&self.card).enumerate() {
            match self.process_card(card, category, page, ledger) {
                CardOutcome::Accepted(product) => extraction.products.push(product),
                CardOutcome::Duplicate => extraction.duplicates += 1,
                CardOutcome::Skipped(reason) => {
                    trace!(category = %category.name, page, card = index, reason, "card skipped");
                }
            }
        }

        extraction
    }

    fn process_card(
        &self,
        card: ElementRef<'_>,
        category: &CategoryConfig,
        page: u32,
        ledger: &mut DedupLedger,
    ) -> CardOutcome {
        let title = self.title_text(card);

        if !category.matches_targets(&title) {
            return CardOutcome::Skipped("no target matched");
        }

        let raw_price = self.price_text(card).unwrap_or_default();
        if title.is_empty() || raw_price.trim().is_empty() {
            return CardOutcome::Skipped("missing title or price");
        }

        if !category.matches_filter(&title) {
            return CardOutcome::Skipped("category filter");
        }

        let price = parse_price(&raw_price);
        if price <= 0.0 {
            return CardOutcome::Skipped("unparseable price");
        }

        let fingerprint = Fingerprint::new(&title, price);
        if ledger.seen(&fingerprint) {
            return CardOutcome::Duplicate;
        }
        ledger.mark(fingerprint);

        CardOutcome::Accepted(Product::from_listing(
            &title,
            price,
            &raw_price,
            page,
            &category.name,
        ))
    }

    fn title_text(&self, card: ElementRef<'_>) -> String {
        first_text(card, &self.title)
            .filter(|t| !t.is_empty())
            .or_else(|| first_text(card, &self.title_fallback))
            .unwrap_or_default()
    }

    /// Full text of the first element whose own text nodes match the price pattern.
    fn price_text(&self, card: ElementRef<'_>) -> Option<String> {
        card.descendants()
            .filter_map(ElementRef::wrap)
            .find(|element| {
                let own_text: String = element
                    .children()
                    .filter_map(|child| child.value().as_text())
                    .map(|text| &**text)
                    .collect();
                self.price_pattern.is_match(&own_text)
            })
            .map(|element| element.text().collect::<String>())
    }
}

fn compile_selector(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector).map_err(|e| CrawlError::invalid_selector(selector, e))
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
}
