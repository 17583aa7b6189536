//! Cluster error types

use std::net::AddrParseError;

/// Result type for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Cluster-specific error types
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Invalid cluster state: {0}")]
    InvalidState(String),

    #[error("Unexpected response from {peer}: {body}")]
    UnexpectedResponse { peer: String, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] AddrParseError),
}

impl ClusterError {
    pub fn network<T: Into<String>>(msg: T) -> Self {
        Self::Network(msg.into())
    }

    pub fn peer_not_found<T: Into<String>>(peer: T) -> Self {
        Self::PeerNotFound(peer.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn invalid_state<T: Into<String>>(msg: T) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn unexpected_response<P: Into<String>, B: Into<String>>(peer: P, body: B) -> Self {
        Self::UnexpectedResponse {
            peer: peer.into(),
            body: body.into(),
        }
    }
}

impl From<reqwest::Error> for ClusterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("HTTP request timed out: {}", err))
        } else {
            Self::network(format!("HTTP client error: {}", err))
        }
    }
}

impl From<quote_types::CommonError> for ClusterError {
    fn from(err: quote_types::CommonError) -> Self {
        Self::configuration(err.to_string())
    }
}
