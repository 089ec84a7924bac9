//! Gaussian random-walk price generator

use anyhow::{Context, Result};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

use super::PriceSource;

/// Simulated prices never fall below this
pub const PRICE_FLOOR: f64 = 10.0;

/// Each tick moves by `N(0, volatility) × price`
#[derive(Debug)]
pub struct SimulatedFeed {
    price: f64,
    dist: Normal,
    rng: StdRng,
}

impl SimulatedFeed {
    /// `seed` makes the walk reproducible; `None` seeds from entropy
    pub fn new(initial_price: f64, volatility: f64, seed: Option<u64>) -> Result<Self> {
        let dist = Normal::new(0.0, volatility)
            .with_context(|| format!("Invalid volatility: {}", volatility))?;
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            price: initial_price.max(PRICE_FLOOR),
            dist,
            rng,
        })
    }

    pub fn price(&self) -> f64 {
        self.price
    }
}

impl PriceSource for SimulatedFeed {
    fn next_price(&mut self) -> Option<f64> {
        let step = self.dist.sample(&mut self.rng) * self.price;
        self.price = (self.price + step).max(PRICE_FLOOR);
        Some(self.price)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
