//! Grid Trading Simulator
//!
//! Simulates a grid trading bot against a stream of price ticks: builds a
//! ladder of levels over a configured range, detects level crossings, opens
//! and closes simulated positions at those levels and tracks realized and
//! unrealized PnL and account equity.
//!
//! Price sources live in [`feed`]; everything else is deterministic given
//! the tick sequence.

pub mod config;
pub mod crossing;
pub mod engine;
pub mod equity;
pub mod error;
pub mod event_log;
pub mod feed;
pub mod grid;
pub mod position;
pub mod series;
pub mod session;
pub mod types;

pub use config::{Config, EngineConfig, FeedConfig, GridConfig, NeutralPartition, PositionMode};
pub use engine::{GridEngine, ProcessOutcome, Snapshot};
pub use error::{GridError, GridResult};
pub use grid::Grid;
pub use session::SharedEngine;
pub use types::*;
