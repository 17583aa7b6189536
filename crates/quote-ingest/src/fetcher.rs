//! Third-party quote providers

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use quote_types::{parse_market_time, QuoteRecord};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the latest quote of a ticker
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    /// Provider name, for logs
    fn api(&self) -> &str;

    async fn fetch(&self, ticker: &str) -> Result<QuoteRecord>;
}

/// Create the fetcher selected by `config.api`
pub fn create_fetcher(config: &IngestConfig) -> Result<Arc<dyn QuoteFetcher>> {
    match config.api.trim().to_lowercase().as_str() {
        "brapi" => Ok(Arc::new(BrapiFetcher::new(
            &config.brapi.base_url,
            &config.brapi.token,
        )?)),
        "stockdata" => Ok(Arc::new(StockDataFetcher::new(
            &config.stockdata.base_url,
            &config.stockdata.token,
        )?)),
        other => Err(IngestError::UnsupportedApi(other.to_string())),
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| IngestError::configuration(format!("Failed to build HTTP client: {}", e)))
}

async fn get_json<T: for<'de> Deserialize<'de>>(request: reqwest::RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IngestError::fetch(format!("HTTP {}: {}", status, body)));
    }
    Ok(response.json::<T>().await?)
}

#[derive(Debug, Deserialize)]
struct BrapiEnvelope {
    #[serde(default)]
    results: Vec<BrapiQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrapiQuote {
    symbol: String,
    #[serde(default)]
    short_name: String,
    #[serde(default)]
    long_name: String,
    regular_market_price: f64,
    regular_market_time: Option<String>,
}

/// brapi.dev quote API
#[derive(Debug, Clone)]
pub struct BrapiFetcher {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl BrapiFetcher {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl QuoteFetcher for BrapiFetcher {
    fn api(&self) -> &str {
        "brapi"
    }

    async fn fetch(&self, ticker: &str) -> Result<QuoteRecord> {
        let url = format!("{}/quote/{}", self.base_url, ticker);
        debug!("Fetching {} from brapi", ticker);

        let envelope: BrapiEnvelope =
            get_json(self.client.get(url).query(&[("token", self.token.as_str())])).await?;
        let quote = envelope
            .results
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::empty_result("brapi", ticker))?;

        let observed_at = match quote.regular_market_time.as_deref() {
            Some(time) => parse_market_time(time)?,
            None => return Err(IngestError::fetch(format!("brapi quote for {} has no market time", ticker))),
        };

        Ok(QuoteRecord::new(
            quote.symbol,
            quote.short_name,
            quote.long_name,
            quote.regular_market_price,
            observed_at,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct StockDataEnvelope {
    #[serde(default)]
    data: Vec<StockDataQuote>,
}

#[derive(Debug, Deserialize)]
struct StockDataQuote {
    ticker: String,
    #[serde(default)]
    name: String,
    price: f64,
    last_trade_time: Option<String>,
}

/// stockdata.org quote API
#[derive(Debug, Clone)]
pub struct StockDataFetcher {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl StockDataFetcher {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl QuoteFetcher for StockDataFetcher {
    fn api(&self) -> &str {
        "stockdata"
    }

    async fn fetch(&self, ticker: &str) -> Result<QuoteRecord> {
        let url = format!("{}/data/quote", self.base_url);
        debug!("Fetching {} from stockdata", ticker);

        let envelope: StockDataEnvelope = get_json(
            self.client
                .get(url)
                .query(&[("symbols", ticker), ("api_token", self.token.as_str())]),
        )
        .await?;
        let quote = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::empty_result("stockdata", ticker))?;

        // the provider reports zone-less UTC timestamps
        let observed_at = match quote.last_trade_time.as_deref() {
            Some(time) => parse_market_time(time)?,
            None => {
                return Err(IngestError::fetch(format!(
                    "stockdata quote for {} has no trade time",
                    ticker
                )))
            }
        };

        Ok(QuoteRecord::new(
            quote.ticker,
            quote.name.clone(),
            quote.name,
            quote.price,
            observed_at,
        ))
    }
}
