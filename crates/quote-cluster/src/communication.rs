//! Cross-node communication for the election protocol

use crate::error::{ClusterError, Result};
use crate::message::ElectionMessage;
use crate::node::{KnownPeers, NodeRole};
use crate::state::NodePhase;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Endpoint accepting inbound election messages
pub const ELECTION_MESSAGES_PATH: &str = "/election/messages";
/// Endpoint answering liveness probes
pub const STATUS_PING_PATH: &str = "/status/ping";
/// Endpoint serving the JSON status report
pub const STATUS_REPORT_PATH: &str = "/status/report";
/// Body of a healthy liveness probe
pub const ALIVE: &str = "alive";

/// Snapshot of a node's view of the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub node_id: String,
    pub role: NodeRole,
    pub phase: NodePhase,
    pub leader_id: Option<String>,
    pub birth_time: i64,
}

impl StatusReport {
    pub fn is_leader(&self) -> bool {
        self.role == NodeRole::Leader
    }
}

/// Delivery of election messages to other nodes
#[async_trait]
pub trait ElectionTransport: Send + Sync {
    /// Deliver `message` to `recipient` only
    async fn send_to(&self, recipient: &str, message: ElectionMessage) -> Result<()>;

    /// Deliver `message` to every known peer; per-peer failures are logged
    async fn broadcast(&self, message: ElectionMessage);
}

/// Request/response probes sent to other nodes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeerProbe: Send + Sync {
    /// Fetch the status report of `peer`
    async fn status(&self, peer: &str) -> Result<StatusReport>;

    /// Liveness probe; a healthy peer answers [`ALIVE`]
    async fn ping(&self, peer: &str) -> Result<String>;
}

/// Anything able to describe the local node to a probing peer
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status_report(&self) -> StatusReport;
}

/// HTTP client side of the protocol
#[derive(Debug, Clone)]
pub struct HttpPeers {
    client: reqwest::Client,
    peers: KnownPeers,
}

impl HttpPeers {
    /// Client for `peers`, bounding every request by `timeout`
    pub fn new(peers: KnownPeers, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClusterError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, peers })
    }

    pub fn peers(&self) -> &KnownPeers {
        &self.peers
    }

    fn url(peer: &str, path: &str) -> String {
        format!("http://{}{}", peer, path)
    }
}

#[async_trait]
impl ElectionTransport for HttpPeers {
    async fn send_to(&self, recipient: &str, message: ElectionMessage) -> Result<()> {
        let response = self
            .client
            .post(Self::url(recipient, ELECTION_MESSAGES_PATH))
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClusterError::unexpected_response(
                recipient,
                format!("HTTP {}", status),
            ));
        }

        tracing::debug!("Sent {} to {}", message.message_type, recipient);
        Ok(())
    }

    async fn broadcast(&self, message: ElectionMessage) {
        for peer in self.peers.iter() {
            if let Err(e) = self.send_to(peer, message.clone()).await {
                tracing::warn!("Failed to send {} to {}: {}", message.message_type, peer, e);
            }
        }
    }
}

#[async_trait]
impl PeerProbe for HttpPeers {
    async fn status(&self, peer: &str) -> Result<StatusReport> {
        let response = self
            .client
            .get(Self::url(peer, STATUS_REPORT_PATH))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClusterError::unexpected_response(peer, format!("HTTP {}", status)));
        }

        Ok(response.json::<StatusReport>().await?)
    }

    async fn ping(&self, peer: &str) -> Result<String> {
        let response = self
            .client
            .get(Self::url(peer, STATUS_PING_PATH))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClusterError::unexpected_response(peer, format!("HTTP {}: {}", status, body)));
        }
        Ok(body)
    }
}
