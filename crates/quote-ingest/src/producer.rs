//! Periodic quote sourcing on follower nodes

use crate::fetcher::QuoteFetcher;
use crate::queue::QuotePublisher;
use quote_cluster::ElectionEngine;
use quote_types::quote_routing_key;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one producer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The leader only coordinates and does not source quotes
    SkippedLeader,
    Published,
    FetchFailed,
    PublishFailed,
}

/// Fetches the configured ticker and publishes it to the quote channel
pub struct QuoteProducer {
    engine: ElectionEngine,
    fetcher: Arc<dyn QuoteFetcher>,
    publisher: Arc<dyn QuotePublisher>,
    ticker: String,
}

impl QuoteProducer {
    pub fn new<S: Into<String>>(
        engine: ElectionEngine,
        fetcher: Arc<dyn QuoteFetcher>,
        publisher: Arc<dyn QuotePublisher>,
        ticker: S,
    ) -> Self {
        Self {
            engine,
            fetcher,
            publisher,
            ticker: ticker.into(),
        }
    }

    pub async fn tick(&self) -> TickOutcome {
        if self.engine.is_leader().await {
            debug!("Leader skips fetching {}", self.ticker);
            return TickOutcome::SkippedLeader;
        }

        let outcome = match self.fetcher.fetch(&self.ticker).await {
            Ok(record) => {
                let routing_key = quote_routing_key(&self.ticker);
                match self.publisher.publish(&routing_key, record).await {
                    Ok(()) => {
                        info!("Published {} quote under {}", self.ticker, routing_key);
                        TickOutcome::Published
                    }
                    Err(e) => {
                        warn!("Failed to publish {} quote: {}", self.ticker, e);
                        TickOutcome::PublishFailed
                    }
                }
            }
            Err(e) => {
                warn!("Failed to fetch {} from {}: {}", self.ticker, self.fetcher.api(), e);
                TickOutcome::FetchFailed
            }
        };

        self.engine.ping_leader().await;
        outcome
    }

    /// Tick every `interval`, starting after `initial_delay`
    pub async fn run(&self, initial_delay: Duration, interval: Duration) {
        tokio::time::sleep(initial_delay).await;
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
