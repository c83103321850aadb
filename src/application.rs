//! Application layer - use cases wiring the crawling core to the outside world

pub mod persist_handler;
pub mod scrape_pipeline;

pub use persist_handler::PersistHandler;
pub use scrape_pipeline::{PipelineReport, ScrapePipeline};
