//! Relay of locally published quotes to the current leader

use crate::config::QueueConfig;
use crate::error::{IngestError, Result};
use crate::queue::{QueueDelivery, QuotePublisher, QuoteQueue};
use async_trait::async_trait;
use quote_cluster::ElectionEngine;
use quote_types::QuoteRecord;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Endpoint on which a node accepts relayed quotes
pub const QUOTE_DELIVERIES_PATH: &str = "/quotes/deliveries";

/// Publisher for multi-process clusters.
///
/// Published records land in a local outbox. [`HttpQuoteRelay::run`] hands
/// them one at a time to whichever node is the leader; the leader's HTTP
/// status settles the outbox delivery.
#[derive(Clone)]
pub struct HttpQuoteRelay {
    outbox: QuoteQueue,
    client: reqwest::Client,
    engine: ElectionEngine,
}

impl HttpQuoteRelay {
    pub fn new(engine: ElectionEngine, queue: QueueConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            outbox: QuoteQueue::new(queue),
            client,
            engine,
        })
    }

    pub fn outbox(&self) -> &QuoteQueue {
        &self.outbox
    }

    /// Forward one delivery; returns whether the leader accepted it
    pub async fn forward(&self, delivery: QueueDelivery) -> bool {
        let leader = match self.engine.current_leader_id().await {
            Some(leader) => leader,
            None => {
                debug!("No leader to relay delivery {} to", delivery.delivery_tag());
                delivery.reject_requeue();
                return false;
            }
        };

        let url = format!("http://{}{}", leader, QUOTE_DELIVERIES_PATH);
        match self.client.post(url).json(delivery.record()).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!("Leader {} accepted delivery {}", leader, delivery.delivery_tag());
                delivery.ack();
                true
            }
            Ok(response) => {
                debug!(
                    "Leader {} refused delivery {} with HTTP {}",
                    leader,
                    delivery.delivery_tag(),
                    response.status()
                );
                delivery.reject_requeue();
                false
            }
            Err(e) => {
                warn!("Failed to relay delivery {} to {}: {}", delivery.delivery_tag(), leader, e);
                delivery.reject_requeue();
                false
            }
        }
    }

    /// Drain the outbox until it is closed
    pub async fn run(&self) {
        info!("Quote relay started");
        let consumer = self.outbox.consumer();
        while let Some(delivery) = consumer.next().await {
            self.forward(delivery).await;
        }
        info!("Quote relay stopped");
    }
}

#[async_trait]
impl QuotePublisher for HttpQuoteRelay {
    async fn publish(&self, routing_key: &str, record: QuoteRecord) -> Result<()> {
        self.outbox.enqueue(routing_key, record)
    }
}
