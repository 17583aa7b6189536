//! Cluster configuration management

use crate::error::{ClusterError, Result};
use crate::node::KnownPeers;
use quote_types::NodeAddressValidator;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Election and membership configuration of a single node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Identity of this node, its advertised `host:port`
    pub node_id: String,

    /// Identities of every cluster member; may include this node
    pub peers: Vec<String>,

    /// How long an election waits for an OK before self-promotion
    pub ok_wait_ms: u64,

    /// Delay between answering OK and asserting our own candidacy
    pub settle_delay_ms: u64,

    /// Delay from start-up to the leader discovery probe
    pub discovery_delay_ms: u64,

    /// How long a deferring node waits for a COORDINATOR before re-electing
    pub coordinator_wait_ms: u64,

    /// Timeout of status and liveness probes sent to peers
    pub probe_timeout_ms: u64,

    /// Cadence of the leader liveness ping
    pub ping_interval_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_id: "127.0.0.1:8081".to_string(),
            peers: vec![],
            ok_wait_ms: 3000,
            settle_delay_ms: 200,
            discovery_delay_ms: 1000,
            coordinator_wait_ms: 5000,
            probe_timeout_ms: 1000,
            ping_interval_ms: 10_000,
        }
    }
}

impl ClusterConfig {
    /// Configuration for `node_id` with the default timeouts
    pub fn new<S: Into<String>>(node_id: S, peers: Vec<String>) -> Self {
        Self {
            node_id: node_id.into(),
            peers,
            ..Default::default()
        }
    }

    /// Replace the peer list from a comma-separated string
    pub fn with_peers_csv(mut self, csv: &str) -> Self {
        self.peers = csv
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn ok_wait(&self) -> Duration {
        Duration::from_millis(self.ok_wait_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn discovery_delay(&self) -> Duration {
        Duration::from_millis(self.discovery_delay_ms)
    }

    pub fn coordinator_wait(&self) -> Duration {
        Duration::from_millis(self.coordinator_wait_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Peers of this node, self excluded
    pub fn known_peers(&self) -> KnownPeers {
        KnownPeers::new(&self.node_id, self.peers.iter().map(String::as_str))
    }

    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClusterError::configuration(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ClusterError::configuration(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClusterError::configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ClusterError::configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(ClusterError::configuration("Node id cannot be empty"));
        }

        if self.peers.iter().any(|p| p.trim().is_empty()) {
            return Err(ClusterError::configuration("Peer entries cannot be blank"));
        }

        let timeouts = [
            ("ok_wait_ms", self.ok_wait_ms),
            ("settle_delay_ms", self.settle_delay_ms),
            ("discovery_delay_ms", self.discovery_delay_ms),
            ("coordinator_wait_ms", self.coordinator_wait_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("ping_interval_ms", self.ping_interval_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(ClusterError::configuration(format!(
                "{} must be greater than zero",
                name
            )));
        }

        Ok(())
    }

    /// Check that this node and every peer is a reachable `host:port`
    pub fn validate_addresses(&self) -> Result<()> {
        let validator = NodeAddressValidator::default();
        validator.validate(&self.node_id)?;
        for peer in &self.peers {
            validator.validate(peer.trim())?;
        }
        Ok(())
    }
}
