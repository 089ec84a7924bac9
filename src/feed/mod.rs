//! Price sources that drive the engine
//!
//! - [`SimulatedFeed`]: seeded Gaussian random walk
//! - [`HttpQuoteFeed`]: public BTC/USD spot quotes, Bitstamp then Binance

mod http;
mod simulated;

pub use http::HttpQuoteFeed;
pub use simulated::{SimulatedFeed, PRICE_FLOOR};

use anyhow::Result;

use crate::config::{FeedConfig, FeedSource};

/// A source of ticks. `None` means no quote was available this time.
pub trait PriceSource: Send {
    fn next_price(&mut self) -> Option<f64>;

    /// Where the last quote came from
    fn name(&self) -> &str;
}

/// Build the configured price source, starting simulated walks at
/// `initial_price`. An unset source is the random walk.
pub fn create_feed(config: &FeedConfig, initial_price: f64) -> Result<Box<dyn PriceSource>> {
    match config.source.unwrap_or_default() {
        FeedSource::Simulated => Ok(Box::new(SimulatedFeed::new(
            initial_price,
            config.volatility,
            config.seed,
        )?)),
        FeedSource::Live => Ok(Box::new(HttpQuoteFeed::new(config.timeout_secs)?)),
    }
}
