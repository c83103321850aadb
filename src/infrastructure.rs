//! Infrastructure layer: browser, broker, database and process plumbing
//!
//! Everything that touches the outside world lives here, behind the traits
//! the crawling core and the application use cases depend on.

pub mod browser;
pub mod config;
pub mod csv_export;
pub mod database_connection;
pub mod logging;
pub mod metrics;
pub mod product_repository;
pub mod queue;
pub mod shutdown;

pub use browser::ChromiumDriver;
pub use config::{AppConfig, ConfigError, ScraperConfig};
pub use csv_export::{CsvExporter, ExportError};
pub use database_connection::DatabaseConnection;
pub use logging::{init_logging, init_logging_with_config};
pub use metrics::{ConsumerMetrics, ScraperMetrics, serve_metrics, spawn_metrics_server};
pub use product_repository::PgProductRepository;
pub use shutdown::shutdown_signal;
pub use queue::{AmqpConsumer, AmqpPublisher, MessageHandler, ProductPublisher, QueueError};
