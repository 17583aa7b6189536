//! Quote Ingestion
//!
//! Followers fetch quotes from a third-party provider and publish them to the
//! quote channel; the elected leader consumes the channel and persists each
//! distinct quote exactly once.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod producer;
pub mod queue;
pub mod relay;
pub mod server;
pub mod store;

pub use config::{IngestConfig, ProviderConfig, QueueConfig, StorageConfig};
pub use error::{IngestError, Result};
pub use fetcher::{create_fetcher, BrapiFetcher, QuoteFetcher, StockDataFetcher};
pub use pipeline::{DeliveryHandle, Disposition, LeadershipView, QuotePipeline};
pub use producer::{QuoteProducer, TickOutcome};
pub use queue::{QueueConsumer, QueueDelivery, QueueStats, QuotePublisher, QuoteQueue};
pub use relay::HttpQuoteRelay;
pub use server::quote_router;
pub use store::{create_store, MemoryQuoteStore, QuoteStore, SledQuoteStore};
