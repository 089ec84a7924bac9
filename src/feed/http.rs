//! Public spot quote polling with exchange fallback
//!
//! No API key required. Bitstamp is tried first, Binance second; when both
//! fail the tick is skipped and the source reads `offline`.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::PriceSource;

const BITSTAMP_TICKER_URL: &str = "https://www.bitstamp.net/api/v2/ticker/btcusd";
const BINANCE_TICKER_URL: &str = "https://api.binance.com/api/v3/ticker/price?symbol=BTCUSDT";

#[derive(Debug, Deserialize)]
struct BitstampTicker {
    last: String,
}

#[derive(Debug, Deserialize)]
struct BinanceTicker {
    price: String,
}

#[derive(Debug)]
pub struct HttpQuoteFeed {
    client: Client,
    bitstamp_url: String,
    binance_url: String,
    last_source: &'static str,
}

impl HttpQuoteFeed {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Self::with_endpoints(timeout_secs, BITSTAMP_TICKER_URL, BINANCE_TICKER_URL)
    }

    pub(crate) fn with_endpoints(
        timeout_secs: u64,
        bitstamp_url: impl Into<String>,
        binance_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            bitstamp_url: bitstamp_url.into(),
            binance_url: binance_url.into(),
            last_source: "offline",
        })
    }

    /// `bitstamp`, `binance` or `offline`
    pub fn last_source(&self) -> &'static str {
        self.last_source
    }

    fn fetch_bitstamp(&self) -> Result<f64> {
        let ticker: BitstampTicker = self
            .client
            .get(&self.bitstamp_url)
            .send()?
            .error_for_status()?
            .json()?;
        parse_quote(&ticker.last)
    }

    fn fetch_binance(&self) -> Result<f64> {
        let ticker: BinanceTicker = self
            .client
            .get(&self.binance_url)
            .send()?
            .error_for_status()?
            .json()?;
        parse_quote(&ticker.price)
    }

    /// Latest quote and its source
    pub fn fetch(&mut self) -> Option<(f64, &'static str)> {
        let quote = match self.fetch_bitstamp() {
            Ok(p) => Some((p, "bitstamp")),
            Err(e) => {
                debug!("Bitstamp quote failed: {}", e);
                match self.fetch_binance() {
                    Ok(p) => Some((p, "binance")),
                    Err(e) => {
                        warn!("Binance quote failed: {}", e);
                        None
                    }
                }
            }
        };
        self.last_source = quote.map(|(_, s)| s).unwrap_or("offline");
        quote
    }
}

impl PriceSource for HttpQuoteFeed {
    fn next_price(&mut self) -> Option<f64> {
        self.fetch().map(|(p, _)| p)
    }

    fn name(&self) -> &str {
        self.last_source
    }
}

fn parse_quote(raw: &str) -> Result<f64> {
    let price: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid quote '{}'", raw))?;
    anyhow::ensure!(price.is_finite() && price > 0.0, "Non-positive quote {}", price);
    Ok(price)
}
