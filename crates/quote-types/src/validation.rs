//! Input validation utilities

use crate::error::{CommonError, Result};
use regex::Regex;

/// Ticker symbol validation rules
pub struct TickerValidator {
    max_length: usize,
    pattern: Regex,
}

impl Default for TickerValidator {
    fn default() -> Self {
        Self {
            max_length: 12,
            pattern: Regex::new(r"^[A-Za-z][A-Za-z0-9.\-]*$").unwrap(),
        }
    }
}

impl TickerValidator {
    /// Validate a ticker symbol
    pub fn validate(&self, ticker: &str) -> Result<()> {
        let ticker = ticker.trim();

        if ticker.is_empty() {
            return Err(CommonError::validation("Ticker cannot be empty"));
        }

        if ticker.len() > self.max_length {
            return Err(CommonError::Validation(format!(
                "Ticker must be at most {} characters long",
                self.max_length
            )));
        }

        if !self.pattern.is_match(ticker) {
            return Err(CommonError::validation(
                "Ticker can only contain letters, digits, dots and hyphens",
            ));
        }

        Ok(())
    }
}

/// Validates node addresses of the form `host:port`
pub struct NodeAddressValidator {
    pattern: Regex,
}

impl Default for NodeAddressValidator {
    fn default() -> Self {
        Self {
            pattern: Regex::new(r"^[A-Za-z0-9.\-]+:(\d{1,5})$").unwrap(),
        }
    }
}

impl NodeAddressValidator {
    /// Validate a `host:port` node address
    pub fn validate(&self, address: &str) -> Result<()> {
        let captures = self.pattern.captures(address).ok_or_else(|| {
            CommonError::Validation(format!(
                "Node address '{}' must have the form host:port",
                address
            ))
        })?;

        let port: u32 = captures[1].parse().unwrap_or(0);
        if port == 0 || port > u16::MAX as u32 {
            return Err(CommonError::Validation(format!(
                "Node address '{}' has an invalid port",
                address
            )));
        }

        Ok(())
    }
}
