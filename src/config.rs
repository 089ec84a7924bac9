//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable overrides for the price feed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{GridError, GridResult};
use crate::GridSide;

/// Default quantity per grid level (0.001 BTC)
pub const DEFAULT_QTY_PER_LEVEL: f64 = 0.001;

/// Default price series retention
pub const DEFAULT_MAX_SAMPLES: usize = 1200;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env();
        Ok(config)
    }

    /// Load from file when a path is given, otherwise start from defaults
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p).with_context(|| format!("Config: {}", p)),
            None => {
                let mut config = Config::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    /// Apply GRID_FEED_* environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(source) = std::env::var("GRID_FEED_SOURCE") {
            match source.parse() {
                Ok(s) => self.feed.source = Some(s),
                Err(e) => tracing::warn!("Ignoring GRID_FEED_SOURCE: {}", e),
            }
        }
        if let Ok(timeout) = std::env::var("GRID_FEED_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(t) if t > 0 => self.feed.timeout_secs = t,
                _ => tracing::warn!("Ignoring GRID_FEED_TIMEOUT_SECS={}", timeout),
            }
        }
    }
}

/// How Neutral mode splits levels into long and short entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeutralPartition {
    /// Split at the range midpoint
    Static,
    /// Split at the live price, recomputed every tick
    #[default]
    Dynamic,
}

/// Grid bot parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default)]
    pub side: GridSide,
    pub margin: f64,
    pub leverage: u32,
    pub grid_count: usize,
    pub range_min: f64,
    pub range_max: f64,
    pub step_shift: f64,
    #[serde(default)]
    pub fee_rate: f64,
    #[serde(default = "default_qty_per_level")]
    pub qty_per_level: f64,
    #[serde(default)]
    pub neutral_partition: NeutralPartition,
}

fn default_qty_per_level() -> f64 {
    DEFAULT_QTY_PER_LEVEL
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            side: GridSide::Neutral,
            margin: 100_000.0,
            leverage: 10,
            grid_count: 12,
            range_min: 60_000.0,
            range_max: 64_000.0,
            step_shift: 50.0,
            fee_rate: 0.0,
            qty_per_level: DEFAULT_QTY_PER_LEVEL,
            neutral_partition: NeutralPartition::Dynamic,
        }
    }
}

impl GridConfig {
    /// Reject configurations the engine cannot trade. Nothing is clamped.
    pub fn validate(&self) -> GridResult<()> {
        if !self.range_min.is_finite()
            || !self.range_max.is_finite()
            || self.range_min <= 0.0
            || self.range_max <= self.range_min
        {
            return Err(GridError::InvalidRange {
                min: self.range_min,
                max: self.range_max,
            });
        }

        if self.grid_count < 2 {
            return Err(GridError::InvalidGridCount(self.grid_count));
        }

        if !(self.margin.is_finite() && self.margin > 0.0) {
            return Err(GridError::InvalidParameter {
                name: "margin",
                value: self.margin,
            });
        }

        if self.leverage < 1 {
            return Err(GridError::InvalidParameter {
                name: "leverage",
                value: self.leverage as f64,
            });
        }

        if !(self.step_shift.is_finite() && self.step_shift > 0.0) {
            return Err(GridError::InvalidParameter {
                name: "step_shift",
                value: self.step_shift,
            });
        }

        if !(self.fee_rate.is_finite() && self.fee_rate >= 0.0) {
            return Err(GridError::InvalidParameter {
                name: "fee_rate",
                value: self.fee_rate,
            });
        }

        if !(self.qty_per_level.is_finite() && self.qty_per_level > 0.0) {
            return Err(GridError::InvalidParameter {
                name: "qty_per_level",
                value: self.qty_per_level,
            });
        }

        Ok(())
    }

    /// Range midpoint
    pub fn midpoint(&self) -> f64 {
        (self.range_min + self.range_max) / 2.0
    }

    /// Spacing between adjacent levels
    pub fn step(&self) -> f64 {
        (self.range_max - self.range_min) / (self.grid_count.max(2) - 1) as f64
    }

    /// Copy with the range moved by `delta`
    pub fn shifted(&self, delta: f64) -> Self {
        GridConfig {
            range_min: self.range_min + delta,
            range_max: self.range_max + delta,
            ..self.clone()
        }
    }
}

/// Position bookkeeping representation, fixed per engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// Independent position per grid level, at most one per level
    #[default]
    PerLevel,
    /// Single net position with weighted-average entry
    Averaged,
}

impl std::str::FromStr for PositionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "per_level" | "perlevel" => Ok(PositionMode::PerLevel),
            "averaged" | "average" => Ok(PositionMode::Averaged),
            other => Err(format!("unknown position mode '{}'", other)),
        }
    }
}

/// Engine construction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub position_mode: PositionMode,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    #[serde(default = "default_initial_price")]
    pub initial_price: f64,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_max_samples() -> usize {
    DEFAULT_MAX_SAMPLES
}

fn default_initial_price() -> f64 {
    62_000.0
}

fn default_log_capacity() -> usize {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            position_mode: PositionMode::PerLevel,
            max_samples: DEFAULT_MAX_SAMPLES,
            initial_price: default_initial_price(),
            log_capacity: default_log_capacity(),
        }
    }
}

/// Where ticks come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    #[default]
    Simulated,
    Live,
}

impl std::str::FromStr for FeedSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Ok(FeedSource::Simulated),
            "live" => Ok(FeedSource::Live),
            other => Err(format!("unknown feed source '{}'", other)),
        }
    }
}

/// Price feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Unset lets each command pick its natural source
    #[serde(default)]
    pub source: Option<FeedSource>,
    /// Per-tick standard deviation of the simulated return
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_volatility() -> f64 {
    0.0012
}

fn default_timeout_secs() -> u64 {
    4
}

fn default_poll_interval_ms() -> u64 {
    1500
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            source: None,
            volatility: default_volatility(),
            seed: None,
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
