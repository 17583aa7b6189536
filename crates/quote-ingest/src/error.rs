//! Ingestion error types

use quote_cluster::ClusterError;
use quote_types::CommonError;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised while fetching, relaying or persisting quotes
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("{api} returned no quote for {ticker}")]
    EmptyResult { api: String, ticker: String },

    #[error("Unsupported quote API: {0}")]
    UnsupportedApi(String),

    #[error("Routing key {0} is not bound to the quote channel")]
    Unroutable(String),

    #[error("Quote channel closed")]
    ChannelClosed,

    #[error("No quotes found for {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(#[from] CommonError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn store<T: Into<String>>(msg: T) -> Self {
        Self::Store(msg.into())
    }

    pub fn fetch<T: Into<String>>(msg: T) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn empty_result<A: Into<String>, T: Into<String>>(api: A, ticker: T) -> Self {
        Self::EmptyResult {
            api: api.into(),
            ticker: ticker.into(),
        }
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<sled::Error> for IngestError {
    fn from(err: sled::Error) -> Self {
        Self::store(err.to_string())
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        Self::fetch(err.to_string())
    }
}
