//! PC Scraper - price collection for a paginated hardware catalog
//!
//! A browser-driven walker collects product listings per category,
//! deduplicates them within a run and fans them out over a durable AMQP
//! queue; a consumer process persists them to PostgreSQL for price
//! comparison.

pub mod application;
pub mod crawling;
pub mod domain;
pub mod infrastructure;
