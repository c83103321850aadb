// Database connection and pool management
// PostgreSQL pool plus the schema the consumer writes into

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::infrastructure::config::DatabaseConfig;

pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Open the pool and verify the server answers.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("PostgreSQL ping failed")?;

        info!("🗄️ Connected to PostgreSQL (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the products table, its index and the best-price view if missing.
    pub async fn migrate(&self) -> Result<()> {
        let create_products_sql = r"
            CREATE TABLE IF NOT EXISTS products (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                brand TEXT NOT NULL,
                price DOUBLE PRECISION NOT NULL CHECK (price > 0),
                raw_price TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                category TEXT NOT NULL,
                scraped_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        ";

        let create_index_sql = r"
            CREATE INDEX IF NOT EXISTS idx_products_category_price ON products (category, price)
        ";

        // Cheapest sighting of each title per category.
        let create_view_sql = r"
            CREATE OR REPLACE VIEW v_best_prices AS
            SELECT DISTINCT ON (category, title)
                title, brand, price, raw_price, page_number, category, scraped_at
            FROM products
            ORDER BY category, title, price ASC
        ";

        sqlx::query(create_products_sql).execute(&self.pool).await?;
        sqlx::query(create_index_sql).execute(&self.pool).await?;
        sqlx::query(create_view_sql).execute(&self.pool).await?;

        info!("Database schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
