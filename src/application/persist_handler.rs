//! Persist use case: store each consumed product and count the outcome

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::domain::product::Product;
use crate::domain::repositories::ProductRepository;
use crate::infrastructure::metrics::{ConsumerMetrics, message_status};
use crate::infrastructure::queue::MessageHandler;

pub struct PersistHandler {
    repository: Arc<dyn ProductRepository>,
    metrics: Arc<ConsumerMetrics>,
}

impl PersistHandler {
    pub fn new(repository: Arc<dyn ProductRepository>, metrics: Arc<ConsumerMetrics>) -> Self {
        Self { repository, metrics }
    }
}

#[async_trait]
impl MessageHandler for PersistHandler {
    async fn handle(&self, product: Product) -> anyhow::Result<()> {
        match self.repository.save(&product).await {
            Ok(id) => {
                self.metrics.database_inserts.inc(&[message_status::SUCCESS]);
                debug!(id, title = %product.title, price = product.price, "Product stored");
                Ok(())
            }
            Err(e) => {
                self.metrics.database_inserts.inc(&[message_status::ERROR]);
                error!("Failed to store '{}': {:#}", product.title, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::ProductStats;
    use crate::infrastructure::queue::{Disposition, process_delivery};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryRepository {
        rows: Mutex<Vec<Product>>,
        broken: bool,
    }

    #[async_trait]
    impl ProductRepository for MemoryRepository {
        async fn save(&self, product: &Product) -> anyhow::Result<i64> {
            if self.broken {
                anyhow::bail!("connection refused");
            }
            let mut rows = self.rows.lock().unwrap();
            rows.push(product.clone());
            Ok(i64::try_from(rows.len())?)
        }

        async fn find_best_prices(&self, category: &str) -> anyhow::Result<Vec<Product>> {
            let mut found: Vec<Product> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.category == category)
                .cloned()
                .collect();
            found.sort_by(|a, b| a.price.total_cmp(&b.price));
            found.truncate(20);
            Ok(found)
        }

        async fn get_stats(&self) -> anyhow::Result<ProductStats> {
            Ok(ProductStats::default())
        }
    }

    fn message() -> Vec<u8> {
        let product = Product::from_listing("Processador AMD Ryzen 5 5600", 799.9, "R$ 799,90", 1, "CPU");
        serde_json::to_vec(&product).unwrap()
    }

    #[tokio::test]
    async fn stored_message_is_acked_and_counted() {
        let repository = Arc::new(MemoryRepository::default());
        let metrics = ConsumerMetrics::new();
        let handler = PersistHandler::new(repository.clone(), Arc::clone(&metrics));

        let disposition = process_delivery(&handler, &message()).await;

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(metrics.database_inserts.get(&[message_status::SUCCESS]), 1);
        let best = repository.find_best_prices("CPU").await.unwrap();
        assert_eq!(best[0].brand, "AMD");
    }

    #[tokio::test]
    async fn storage_failure_requeues() {
        let repository = Arc::new(MemoryRepository {
            broken: true,
            ..MemoryRepository::default()
        });
        let metrics = ConsumerMetrics::new();
        let handler = PersistHandler::new(repository, Arc::clone(&metrics));

        let disposition = process_delivery(&handler, &message()).await;

        assert!(matches!(disposition, Disposition::Requeue { .. }));
        assert_eq!(metrics.database_inserts.get(&[message_status::ERROR]), 1);
    }
}
