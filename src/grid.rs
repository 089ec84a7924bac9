//! Grid builder
//!
//! Derives the ladder of price levels from a [`GridConfig`] and splits it into
//! long-entry (buy the dip) and short-entry (sell the rally) subsets.
//!
//! ## Partitioning
//! - `Long`: levels at or below the range midpoint, all long-entry
//! - `Short`: levels at or above the range midpoint, all short-entry
//! - `Neutral` static: below the midpoint long, above short
//! - `Neutral` dynamic: below the pivot price long, above short
//!
//! A level sitting exactly on the partition point goes to [`MIDPOINT_SIDE`].
//! Classification is never cached: callers pass the pivot price every time.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::{GridConfig, NeutralPartition};
use crate::error::GridResult;
use crate::{GridSide, PositionSide};

/// Side assigned to a level exactly on the partition point
pub const MIDPOINT_SIDE: PositionSide = PositionSide::Short;

/// Relative tolerance used for "exactly on" comparisons
const LEVEL_EPS_FRACTION: f64 = 1e-9;

/// Classify a level against a partition point.
///
/// Below the pivot is long-entry, above is short-entry, within `eps` of the
/// pivot resolves to [`MIDPOINT_SIDE`].
pub fn classify(level: f64, pivot: f64, eps: f64) -> PositionSide {
    if (level - pivot).abs() <= eps {
        MIDPOINT_SIDE
    } else if level < pivot {
        PositionSide::Long
    } else {
        PositionSide::Short
    }
}

/// Levels split by entry side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelPartition {
    pub long: Vec<f64>,
    pub short: Vec<f64>,
}

/// Evenly spaced price ladder for one configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    levels: Vec<f64>,
    step: f64,
    range_min: f64,
    range_max: f64,
    side: GridSide,
    neutral_partition: NeutralPartition,
}

impl Grid {
    /// Build the ladder, rejecting invalid configurations
    pub fn build(config: &GridConfig) -> GridResult<Self> {
        config.validate()?;

        let n = config.grid_count;
        let step = config.step();
        let levels = (0..n)
            .map(|i| {
                if i == n - 1 {
                    config.range_max
                } else {
                    config.range_min + step * i as f64
                }
            })
            .collect();

        Ok(Self {
            levels,
            step,
            range_min: config.range_min,
            range_max: config.range_max,
            side: config.side,
            neutral_partition: config.neutral_partition,
        })
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn range(&self) -> (f64, f64) {
        (self.range_min, self.range_max)
    }

    pub fn midpoint(&self) -> f64 {
        (self.range_min + self.range_max) / 2.0
    }

    pub fn eps(&self) -> f64 {
        ((self.range_max - self.range_min) * LEVEL_EPS_FRACTION).max(1e-9)
    }

    /// Partition point for the given live price
    pub fn pivot(&self, price: f64) -> f64 {
        match (self.side, self.neutral_partition) {
            (GridSide::Neutral, NeutralPartition::Dynamic) => price,
            _ => self.midpoint(),
        }
    }

    /// Entry side of `level` when price is `price`, `None` if inactive
    pub fn entry_side(&self, level: f64, price: f64) -> Option<PositionSide> {
        let eps = self.eps();
        let mid = self.midpoint();
        match self.side {
            GridSide::Long => (level <= mid + eps).then_some(PositionSide::Long),
            GridSide::Short => (level >= mid - eps).then_some(PositionSide::Short),
            GridSide::Neutral => Some(classify(level, self.pivot(price), eps)),
        }
    }

    /// Split all levels by entry side at the given price
    pub fn partition(&self, price: f64) -> LevelPartition {
        let mut partition = LevelPartition::default();
        for &level in &self.levels {
            match self.entry_side(level, price) {
                Some(PositionSide::Long) => partition.long.push(level),
                Some(PositionSide::Short) => partition.short.push(level),
                None => {}
            }
        }
        partition
    }

    /// Highest level strictly below `price`
    pub fn level_below(&self, price: f64) -> Option<f64> {
        let eps = self.eps();
        self.levels.iter().rev().copied().find(|&l| l < price - eps)
    }

    /// Lowest level strictly above `price`
    pub fn level_above(&self, price: f64) -> Option<f64> {
        let eps = self.eps();
        self.levels.iter().copied().find(|&l| l > price + eps)
    }

    /// Next level beyond `entry` in the favorable direction, or one step away
    pub fn take_profit(&self, side: PositionSide, entry: f64) -> f64 {
        match side {
            PositionSide::Long => self.level_above(entry).unwrap_or(entry + self.step),
            PositionSide::Short => self.level_below(entry).unwrap_or(entry - self.step),
        }
    }

    /// Smallest gap between adjacent levels
    pub fn min_spacing(&self) -> f64 {
        self.levels
            .iter()
            .tuple_windows()
            .map(|(a, b)| b - a)
            .fold(f64::INFINITY, f64::min)
    }
}
