//! Node configuration: HTTP server, cluster membership and ingestion

use crate::cli::Cli;
use anyhow::{Context, Result};
use quote_cluster::ClusterConfig;
use quote_ingest::IngestConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub cluster: ClusterConfig,
    pub ingest: IngestConfig,
}

impl NodeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Configuration file if given, defaults otherwise, then command line overrides
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(bind) = &cli.bind {
            self.server.bind_address = bind.clone();
        }
        if let Some(node_id) = &cli.node_id {
            self.cluster.node_id = node_id.clone();
        }
        if let Some(peers) = &cli.peers {
            self.cluster = std::mem::take(&mut self.cluster).with_peers_csv(peers);
        }
        if let Some(ticker) = &cli.ticker {
            self.ingest.ticker = ticker.clone();
        }
        if let Some(api) = &cli.api {
            self.ingest.api = api.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.trim().is_empty() {
            anyhow::bail!("server.bind_address cannot be empty");
        }
        self.cluster.validate().context("Invalid cluster configuration")?;
        self.cluster
            .validate_addresses()
            .context("Invalid cluster addresses")?;
        self.ingest.validate().context("Invalid ingest configuration")?;
        Ok(())
    }
}
