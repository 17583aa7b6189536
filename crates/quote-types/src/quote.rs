//! Market quote types

use crate::error::{CommonError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized market quote as produced by a fetcher and persisted by the leader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    /// Ticker symbol, always upper case
    pub symbol: String,
    /// Short display name
    pub short_name: String,
    /// Long display name
    pub long_name: String,
    /// Last traded price
    pub price: f64,
    /// Instant the provider observed this price
    pub observed_at: DateTime<Utc>,
}

impl QuoteRecord {
    /// Create a record, normalizing the symbol
    pub fn new(
        symbol: impl AsRef<str>,
        short_name: impl Into<String>,
        long_name: impl Into<String>,
        price: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: normalize_symbol(symbol.as_ref()),
            short_name: short_name.into(),
            long_name: long_name.into(),
            price,
            observed_at,
        }
    }

    /// Natural key used for deduplication
    pub fn key(&self) -> QuoteKey {
        QuoteKey::new(&self.symbol, self.observed_at)
    }
}

/// Deduplication key of a quote: one record per symbol and observation instant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuoteKey {
    pub symbol: String,
    pub observed_at: DateTime<Utc>,
}

impl QuoteKey {
    pub fn new(symbol: &str, observed_at: DateTime<Utc>) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            observed_at,
        }
    }
}

impl fmt::Display for QuoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.observed_at.to_rfc3339())
    }
}

/// Upper-case and trim a ticker symbol
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Parse a provider market timestamp into a UTC instant.
///
/// Accepts RFC 3339 strings. Providers that omit the zone designator
/// (e.g. `2023-09-12T15:59:56.000000`) are read as UTC.
pub fn parse_market_time(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CommonError::invalid_timestamp(value, "empty timestamp"));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| CommonError::invalid_timestamp(value, e))
}
