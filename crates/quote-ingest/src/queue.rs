//! Quote channel with manual acknowledgement.
//!
//! Records are published under a routing key and consumed one at a time per
//! consumer. A delivery stays unacknowledged until it is settled with
//! [`QueueDelivery::ack`] or [`QueueDelivery::reject_requeue`]; a delivery
//! dropped unsettled is requeued. Requeued records come back flagged as
//! redelivered after an exponential backoff.

use crate::config::QueueConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use quote_types::{topic_matches, QuoteRecord, QUOTE_BINDING};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Anything quotes can be published to
#[async_trait]
pub trait QuotePublisher: Send + Sync {
    async fn publish(&self, routing_key: &str, record: QuoteRecord) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Envelope {
    tag: u64,
    routing_key: String,
    record: QuoteRecord,
    attempts: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Envelope>,
    unacked: usize,
    delayed: usize,
    closed: bool,
}

impl QueueState {
    fn drained(&self) -> bool {
        self.closed && self.ready.is_empty() && self.unacked == 0 && self.delayed == 0
    }
}

#[derive(Debug)]
struct QueueInner {
    state: Mutex<QueueState>,
    changed: Notify,
    next_tag: AtomicU64,
    config: QueueConfig,
}

impl QueueInner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ack(&self, tag: u64) {
        let mut state = self.state();
        state.unacked = state.unacked.saturating_sub(1);
        drop(state);
        debug!("Delivery {} acknowledged", tag);
        self.changed.notify_waiters();
    }

    fn requeue(self: &Arc<Self>, mut envelope: Envelope) {
        envelope.attempts += 1;
        let delay = requeue_delay(&self.config, envelope.attempts);

        {
            let mut state = self.state();
            state.unacked = state.unacked.saturating_sub(1);
            state.delayed += 1;
        }
        debug!(
            "Delivery {} requeued (attempt {}), visible again in {:?}",
            envelope.tag, envelope.attempts, delay
        );

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let queue = Arc::clone(self);
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    queue.make_ready(envelope);
                });
            }
            Err(_) => self.make_ready(envelope),
        }
    }

    fn make_ready(&self, envelope: Envelope) {
        let mut state = self.state();
        state.delayed = state.delayed.saturating_sub(1);
        state.ready.push_back(envelope);
        drop(state);
        self.changed.notify_waiters();
    }
}

/// Backoff before a requeued record is visible again
pub fn requeue_delay(config: &QueueConfig, attempts: u32) -> Duration {
    let factor = 1u32
        .checked_shl(attempts.saturating_sub(1))
        .unwrap_or(u32::MAX);
    config
        .requeue_backoff()
        .saturating_mul(factor)
        .min(config.max_requeue_backoff())
}

/// Point-in-time counters of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub ready: usize,
    pub unacked: usize,
    pub delayed: usize,
}

/// Durable in-process quote queue bound to `quotes.#`
#[derive(Debug, Clone)]
pub struct QuoteQueue {
    inner: Arc<QueueInner>,
}

impl QuoteQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                changed: Notify::new(),
                next_tag: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Enqueue `record` if `routing_key` matches the queue binding
    pub fn enqueue(&self, routing_key: &str, record: QuoteRecord) -> Result<()> {
        if !topic_matches(QUOTE_BINDING, routing_key) {
            return Err(IngestError::Unroutable(routing_key.to_string()));
        }

        let tag = self.inner.next_tag.fetch_add(1, Ordering::Relaxed);
        let mut state = self.inner.state();
        if state.closed {
            return Err(IngestError::ChannelClosed);
        }
        state.ready.push_back(Envelope {
            tag,
            routing_key: routing_key.to_string(),
            record,
            attempts: 0,
        });
        drop(state);

        debug!("Published delivery {} under {}", tag, routing_key);
        self.inner.changed.notify_waiters();
        Ok(())
    }

    /// New consumer with a prefetch of one
    pub fn consumer(&self) -> QueueConsumer {
        QueueConsumer {
            queue: Arc::clone(&self.inner),
            prefetch: Arc::new(Semaphore::new(1)),
        }
    }

    /// Refuse new records; consumers stop once the queue is drained
    pub fn close(&self) {
        self.inner.state().closed = true;
        self.inner.changed.notify_waiters();
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state();
        QueueStats {
            ready: state.ready.len(),
            unacked: state.unacked,
            delayed: state.delayed,
        }
    }
}

#[async_trait]
impl QuotePublisher for QuoteQueue {
    async fn publish(&self, routing_key: &str, record: QuoteRecord) -> Result<()> {
        self.enqueue(routing_key, record)
    }
}

/// Consumer holding at most one unsettled delivery
#[derive(Debug)]
pub struct QueueConsumer {
    queue: Arc<QueueInner>,
    prefetch: Arc<Semaphore>,
}

impl QueueConsumer {
    /// Wait for the next delivery; `None` once the queue is closed and drained
    pub async fn next(&self) -> Option<QueueDelivery> {
        let permit = Arc::clone(&self.prefetch).acquire_owned().await.ok()?;

        loop {
            let changed = self.queue.changed.notified();
            {
                let mut state = self.queue.state();
                if let Some(envelope) = state.ready.pop_front() {
                    state.unacked += 1;
                    return Some(QueueDelivery {
                        envelope,
                        queue: Arc::clone(&self.queue),
                        settled: false,
                        _permit: permit,
                    });
                }
                if state.drained() {
                    return None;
                }
            }
            changed.await;
        }
    }
}

/// One unacknowledged record handed to a consumer
#[derive(Debug)]
pub struct QueueDelivery {
    envelope: Envelope,
    queue: Arc<QueueInner>,
    settled: bool,
    _permit: OwnedSemaphorePermit,
}

impl QueueDelivery {
    pub fn record(&self) -> &QuoteRecord {
        &self.envelope.record
    }

    pub fn routing_key(&self) -> &str {
        &self.envelope.routing_key
    }

    pub fn delivery_tag(&self) -> u64 {
        self.envelope.tag
    }

    /// Whether the record was requeued at least once
    pub fn redelivered(&self) -> bool {
        self.envelope.attempts > 0
    }

    pub fn attempts(&self) -> u32 {
        self.envelope.attempts
    }

    /// Consume the record for good
    pub fn ack(mut self) {
        self.settled = true;
        self.queue.ack(self.envelope.tag);
    }

    /// Return the record to the queue for a later attempt
    pub fn reject_requeue(mut self) {
        self.settled = true;
        self.queue.requeue(self.envelope.clone());
    }
}

impl Drop for QueueDelivery {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Delivery {} dropped unsettled, requeueing", self.envelope.tag);
            self.queue.requeue(self.envelope.clone());
        }
    }
}
