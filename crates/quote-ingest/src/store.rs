//! Quote persistence backends

use crate::config::StorageConfig;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quote_types::{normalize_symbol, QuoteKey, QuoteRecord};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Persistent collection of quotes, unique by natural key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Insert or overwrite the record stored under its natural key
    async fn save(&self, record: &QuoteRecord) -> Result<()>;

    /// Look up a record by natural key
    async fn find_by_symbol_and_time(
        &self,
        symbol: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<Option<QuoteRecord>>;

    /// Every record of `symbol`, oldest first
    async fn find_by_symbol(&self, symbol: &str) -> Result<Vec<QuoteRecord>>;

    /// Every stored record
    async fn find_all(&self) -> Result<Vec<QuoteRecord>>;
}

/// Create the store selected by `config`
pub fn create_store(config: &StorageConfig) -> Result<Arc<dyn QuoteStore>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryQuoteStore::new())),
        StorageConfig::Sled { path } => Ok(Arc::new(SledQuoteStore::open(path)?)),
    }
}

/// In-memory store (for testing)
#[derive(Debug, Default)]
pub struct MemoryQuoteStore {
    records: RwLock<BTreeMap<QuoteKey, QuoteRecord>>,
}

impl MemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    async fn save(&self, record: &QuoteRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.key(), record.clone());
        Ok(())
    }

    async fn find_by_symbol_and_time(
        &self,
        symbol: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<Option<QuoteRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&QuoteKey::new(symbol, observed_at)).cloned())
    }

    async fn find_by_symbol(&self, symbol: &str) -> Result<Vec<QuoteRecord>> {
        let symbol = normalize_symbol(symbol);
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.symbol == symbol)
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<QuoteRecord>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }
}

/// Sled-based store.
///
/// Keys are `SYMBOL|epoch-seconds|subsecond-nanos`, zero padded so that a
/// symbol's rows iterate in time order; values the JSON encoded record.
pub struct SledQuoteStore {
    db: sled::Db,
}

impl SledQuoteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn key(symbol: &str, observed_at: DateTime<Utc>) -> String {
        format!(
            "{}|{:020}|{:09}",
            normalize_symbol(symbol),
            observed_at.timestamp(),
            observed_at.timestamp_subsec_nanos()
        )
    }

    fn prefix(symbol: &str) -> String {
        format!("{}|", normalize_symbol(symbol))
    }

    fn decode_all(iter: sled::Iter) -> Result<Vec<QuoteRecord>> {
        let mut records = Vec::new();
        for item in iter {
            let (_, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl QuoteStore for SledQuoteStore {
    async fn save(&self, record: &QuoteRecord) -> Result<()> {
        let serialized = serde_json::to_vec(record)?;
        self.db
            .insert(Self::key(&record.symbol, record.observed_at), serialized)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn find_by_symbol_and_time(
        &self,
        symbol: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<Option<QuoteRecord>> {
        let Some(data) = self.db.get(Self::key(symbol, observed_at))? else {
            return Ok(None);
        };
        let record: QuoteRecord = serde_json::from_slice(&data)?;
        Ok((record.observed_at == observed_at).then_some(record))
    }

    async fn find_by_symbol(&self, symbol: &str) -> Result<Vec<QuoteRecord>> {
        Self::decode_all(self.db.scan_prefix(Self::prefix(symbol)))
    }

    async fn find_all(&self) -> Result<Vec<QuoteRecord>> {
        Self::decode_all(self.db.iter())
    }
}
