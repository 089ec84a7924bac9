//! Bounded price series
//!
//! Append-only buffer of price samples. Once `max_samples` is reached the
//! oldest sample is dropped on every push.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::error::{GridError, GridResult};
use crate::PriceSample;

#[derive(Debug, Clone)]
pub struct PriceSeries {
    samples: VecDeque<PriceSample>,
    max_samples: usize,
}

impl PriceSeries {
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(2);
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Series seeded with a single starting price
    pub fn with_initial(max_samples: usize, price: f64) -> GridResult<Self> {
        let mut series = Self::new(max_samples);
        series.push(price)?;
        Ok(series)
    }

    /// Append a price stamped with the current time
    pub fn push(&mut self, price: f64) -> GridResult<()> {
        self.push_at(Utc::now(), price)
    }

    pub fn push_at(&mut self, timestamp: DateTime<Utc>, price: f64) -> GridResult<()> {
        if !price.is_finite() || price <= 0.0 {
            return Err(GridError::InvalidPrice(price));
        }
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(PriceSample { timestamp, price });
        Ok(())
    }

    pub fn current(&self) -> Option<f64> {
        self.samples.back().map(|s| s.price)
    }

    pub fn previous(&self) -> Option<f64> {
        let n = self.samples.len();
        if n < 2 {
            return None;
        }
        self.samples.get(n - 2).map(|s| s.price)
    }

    pub fn last_sample(&self) -> Option<&PriceSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceSample> {
        self.samples.iter()
    }
}
