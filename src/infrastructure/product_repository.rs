//! PostgreSQL product repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::product::Product;
use crate::domain::repositories::{ProductRepository, ProductStats};

/// Rows returned by [`ProductRepository::find_best_prices`].
const BEST_PRICES_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn product_from_row(row: &PgRow) -> Result<Product> {
    let page: i32 = row.try_get("page_number")?;
    Ok(Product {
        title: row.try_get("title")?,
        brand: row.try_get("brand")?,
        price: row.try_get("price")?,
        raw_price: row.try_get("raw_price")?,
        page: u32::try_from(page).context("negative page number in storage")?,
        category: row.try_get("category")?,
    })
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn save(&self, product: &Product) -> Result<i64> {
        let page = i32::try_from(product.page).context("page number out of range")?;
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO products (title, brand, price, raw_price, page_number, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(&product.title)
        .bind(&product.brand)
        .bind(product.price)
        .bind(&product.raw_price)
        .bind(page)
        .bind(&product.category)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to insert product '{}'", product.title))?;
        Ok(id)
    }

    async fn find_best_prices(&self, category: &str) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r"
            SELECT title, brand, price, raw_price, page_number, category
            FROM v_best_prices
            WHERE category = $1
            ORDER BY price ASC
            LIMIT $2
            ",
        )
        .bind(category)
        .bind(BEST_PRICES_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    async fn get_stats(&self) -> Result<ProductStats> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total,
                   COUNT(DISTINCT category) AS categories,
                   MIN(price) AS min_price,
                   MAX(price) AS max_price,
                   AVG(price) AS avg_price
            FROM products
            ",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ProductStats {
            total_products: row.try_get("total")?,
            categories: row.try_get("categories")?,
            min_price: row.try_get::<Option<f64>, _>("min_price")?.unwrap_or_default(),
            max_price: row.try_get::<Option<f64>, _>("max_price")?.unwrap_or_default(),
            avg_price: row.try_get::<Option<f64>, _>("avg_price")?.unwrap_or_default(),
        })
    }
}
