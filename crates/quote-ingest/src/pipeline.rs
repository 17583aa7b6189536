//! Leader-gated, idempotent quote persistence

use crate::error::Result;
use crate::queue::{QueueConsumer, QueueDelivery};
use crate::store::QuoteStore;
use async_trait::async_trait;
use quote_cluster::ElectionEngine;
use quote_types::QuoteRecord;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Settlement side of a delivered quote
pub trait DeliveryHandle: Send {
    /// Consume the delivery for good
    fn ack(self);

    /// Give the delivery back to the channel for another attempt
    fn reject_requeue(self);
}

impl DeliveryHandle for QueueDelivery {
    fn ack(self) {
        QueueDelivery::ack(self)
    }

    fn reject_requeue(self) {
        QueueDelivery::reject_requeue(self)
    }
}

/// What the pipeline decided for one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// New record written to the store
    Persisted,
    /// Record already stored under its natural key
    Duplicate,
    /// This node may not write; another consumer should take it
    NotLeader,
    /// Lookup or write failed; retry later
    Failed,
}

impl Disposition {
    /// Whether the delivery is consumed (acknowledged)
    pub fn is_ack(self) -> bool {
        matches!(self, Self::Persisted | Self::Duplicate)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted => write!(f, "persisted"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::NotLeader => write!(f, "not_leader"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Read-only view of leadership used to gate writes
#[async_trait]
pub trait LeadershipView: Send + Sync {
    /// Whether this node is the leader and a leader is recognized
    async fn may_persist(&self) -> bool;
}

#[async_trait]
impl LeadershipView for ElectionEngine {
    async fn may_persist(&self) -> bool {
        self.is_leader().await && self.current_leader_id().await.is_some()
    }
}

/// Consumer side of the quote channel
#[derive(Clone)]
pub struct QuotePipeline {
    leadership: Arc<dyn LeadershipView>,
    store: Arc<dyn QuoteStore>,
}

impl QuotePipeline {
    pub fn new(leadership: Arc<dyn LeadershipView>, store: Arc<dyn QuoteStore>) -> Self {
        Self { leadership, store }
    }

    pub fn store(&self) -> &Arc<dyn QuoteStore> {
        &self.store
    }

    /// Decide and apply the fate of `record` without settling anything
    pub async fn process(&self, record: &QuoteRecord) -> Disposition {
        if !self.leadership.may_persist().await {
            debug!("Not the leader, requeueing {}", record.key());
            return Disposition::NotLeader;
        }

        match self.persist_once(record).await {
            Ok(disposition) => disposition,
            Err(e) => {
                error!("Failed to process {}: {}", record.key(), e);
                Disposition::Failed
            }
        }
    }

    async fn persist_once(&self, record: &QuoteRecord) -> Result<Disposition> {
        let existing = self
            .store
            .find_by_symbol_and_time(&record.symbol, record.observed_at)
            .await?;
        if existing.is_some() {
            info!("Quote {} already stored, acknowledging", record.key());
            return Ok(Disposition::Duplicate);
        }

        self.store.save(record).await?;
        info!("Quote {} persisted at {:.4}", record.key(), record.price);
        Ok(Disposition::Persisted)
    }

    /// Process a delivered record and settle its handle
    pub async fn on_quote_delivered<H: DeliveryHandle>(&self, record: &QuoteRecord, handle: H) -> Disposition {
        let disposition = self.process(record).await;
        if disposition.is_ack() {
            handle.ack();
        } else {
            if disposition == Disposition::Failed {
                warn!("Requeueing {} after a processing failure", record.key());
            }
            handle.reject_requeue();
        }
        disposition
    }

    /// Consume deliveries one at a time until the channel closes
    pub async fn run(&self, consumer: QueueConsumer) {
        info!("Quote pipeline started");
        while let Some(delivery) = consumer.next().await {
            let record = delivery.record().clone();
            self.on_quote_delivered(&record, delivery).await;
        }
        info!("Quote channel closed, pipeline stopped");
    }
}
