//! In-process message bus connecting engines that share one runtime

use crate::communication::{ElectionTransport, PeerProbe, StatusReport, StatusSource, ALIVE};
use crate::election::ElectionEngine;
use crate::error::{ClusterError, Result};
use crate::message::ElectionMessage;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use quote_types::election_route;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Default)]
struct BusInner {
    mailboxes: DashMap<String, mpsc::UnboundedSender<ElectionMessage>>,
    statuses: DashMap<String, Arc<dyn StatusSource>>,
    down: DashSet<String>,
}

/// Shared in-process bus.
///
/// Every node owns a mailbox addressed by its election route. Cloning the bus
/// yields another handle to the same mailboxes.
#[derive(Clone, Default)]
pub struct LocalBus {
    inner: Arc<BusInner>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reopen) the mailbox of `node_id`
    pub fn register_mailbox(&self, node_id: &str) -> mpsc::UnboundedReceiver<ElectionMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.mailboxes.insert(election_route(node_id), tx);
        self.inner.down.remove(node_id);
        rx
    }

    /// Let `source` answer status probes addressed to `node_id`
    pub fn register_status(&self, node_id: &str, source: Arc<dyn StatusSource>) {
        self.inner.statuses.insert(node_id.to_string(), source);
    }

    /// Attach `engine` to the bus and spawn its listener
    pub fn join(&self, engine: &ElectionEngine) -> JoinHandle<()> {
        let node_id = engine.my_id().to_string();
        let mailbox = self.register_mailbox(&node_id);
        self.register_status(&node_id, Arc::new(engine.clone()));
        info!("Node {} joined the local bus", node_id);
        engine.spawn_listener(mailbox)
    }

    /// Put `message` into the mailbox of `node_id`
    pub fn deliver(&self, node_id: &str, message: ElectionMessage) -> Result<()> {
        let route = election_route(node_id);
        let mailbox = self
            .inner
            .mailboxes
            .get(&route)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ClusterError::peer_not_found(node_id))?;

        mailbox
            .send(message)
            .map_err(|_| ClusterError::network(format!("Mailbox of {} is closed", node_id)))
    }

    /// Simulate the crash of `node_id`.
    ///
    /// Its mailbox closes, probes to it fail and its own sends fail.
    pub fn crash(&self, node_id: &str) {
        self.inner.mailboxes.remove(&election_route(node_id));
        self.inner.statuses.remove(node_id);
        self.inner.down.insert(node_id.to_string());
        info!("Node {} crashed", node_id);
    }

    pub fn is_down(&self, node_id: &str) -> bool {
        self.inner.down.contains(node_id)
    }

    /// Transport and probe used by `node_id`
    pub fn transport(&self, node_id: &str) -> LocalTransport {
        LocalTransport {
            bus: self.clone(),
            node_id: node_id.to_string(),
        }
    }

    fn ensure_up(&self, node_id: &str) -> Result<()> {
        if self.is_down(node_id) {
            return Err(ClusterError::network(format!("Node {} is down", node_id)));
        }
        Ok(())
    }

    fn status_source(&self, node_id: &str) -> Result<Arc<dyn StatusSource>> {
        self.inner
            .statuses
            .get(node_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ClusterError::peer_not_found(node_id))
    }
}

/// One node's view of a [`LocalBus`]
#[derive(Clone)]
pub struct LocalTransport {
    bus: LocalBus,
    node_id: String,
}

#[async_trait]
impl ElectionTransport for LocalTransport {
    async fn send_to(&self, recipient: &str, message: ElectionMessage) -> Result<()> {
        self.bus.ensure_up(&self.node_id)?;
        self.bus.deliver(recipient, message)
    }

    async fn broadcast(&self, message: ElectionMessage) {
        if self.bus.ensure_up(&self.node_id).is_err() {
            debug!("Dropping broadcast from crashed node {}", self.node_id);
            return;
        }

        let own_route = election_route(&self.node_id);
        let recipients: Vec<_> = self
            .bus
            .inner
            .mailboxes
            .iter()
            .filter(|entry| *entry.key() != own_route)
            .map(|entry| entry.value().clone())
            .collect();

        for mailbox in recipients {
            let _ = mailbox.send(message.clone());
        }
    }
}

#[async_trait]
impl PeerProbe for LocalTransport {
    async fn status(&self, peer: &str) -> Result<StatusReport> {
        self.bus.ensure_up(&self.node_id)?;
        let source = self.bus.status_source(peer)?;
        Ok(source.status_report().await)
    }

    async fn ping(&self, peer: &str) -> Result<String> {
        self.bus.ensure_up(&self.node_id)?;
        self.bus.status_source(peer)?;
        Ok(ALIVE.to_string())
    }
}
