//! Repository interfaces for scraped price data

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

/// Aggregate figures over every stored listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductStats {
    pub total_products: i64,
    pub categories: i64,
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Persist one listing, returning its storage id.
    async fn save(&self, product: &Product) -> Result<i64>;

    /// Cheapest listings in a category, ascending by price (at most 20).
    async fn find_best_prices(&self, category: &str) -> Result<Vec<Product>>;

    async fn get_stats(&self) -> Result<ProductStats>;
}
