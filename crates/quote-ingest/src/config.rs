//! Ingestion configuration

use crate::error::{IngestError, Result};
use quote_types::TickerValidator;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where the leader persists quotes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Volatile in-process store
    Memory,

    /// Embedded store on local disk
    Sled { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Sled {
            path: PathBuf::from("data/quotes"),
        }
    }
}

/// Endpoint and credentials of one quote provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: String,
}

/// Redelivery timing of the quote channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub requeue_backoff_ms: u64,
    pub max_requeue_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            requeue_backoff_ms: 100,
            max_requeue_backoff_ms: 5000,
        }
    }
}

impl QueueConfig {
    pub fn requeue_backoff(&self) -> Duration {
        Duration::from_millis(self.requeue_backoff_ms)
    }

    pub fn max_requeue_backoff(&self) -> Duration {
        Duration::from_millis(self.max_requeue_backoff_ms)
    }
}

/// Quote sourcing and persistence settings of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Ticker fetched by this node
    pub ticker: String,

    /// Provider used to fetch quotes: `brapi` or `stockdata`
    pub api: String,

    pub brapi: ProviderConfig,
    pub stockdata: ProviderConfig,

    pub fetch_interval_secs: u64,
    pub initial_fetch_delay_secs: u64,

    pub storage: StorageConfig,
    pub queue: QueueConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ticker: "PETR4".to_string(),
            api: "brapi".to_string(),
            brapi: ProviderConfig {
                base_url: "https://brapi.dev/api".to_string(),
                token: String::new(),
            },
            stockdata: ProviderConfig {
                base_url: "https://api.stockdata.org/v1".to_string(),
                token: String::new(),
            },
            fetch_interval_secs: 3600,
            initial_fetch_delay_secs: 10,
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    pub fn initial_fetch_delay(&self) -> Duration {
        Duration::from_secs(self.initial_fetch_delay_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        TickerValidator::default().validate(&self.ticker)?;

        match self.api.trim().to_lowercase().as_str() {
            "brapi" | "stockdata" => {}
            other => return Err(IngestError::UnsupportedApi(other.to_string())),
        }

        if self.fetch_interval_secs == 0 {
            return Err(IngestError::configuration("fetch_interval_secs must be greater than zero"));
        }

        if self.queue.requeue_backoff_ms > self.queue.max_requeue_backoff_ms {
            return Err(IngestError::configuration(
                "requeue_backoff_ms cannot exceed max_requeue_backoff_ms",
            ));
        }

        Ok(())
    }
}
