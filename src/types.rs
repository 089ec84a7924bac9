//! Core data types used across the grid engine

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Directional mode of the grid bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridSide {
    /// Only buy-the-dip levels (at or below the range midpoint)
    Long,
    /// Only sell-the-rally levels (at or above the range midpoint)
    Short,
    /// Long-entry below the partition point, short-entry above it
    #[default]
    Neutral,
}

impl std::fmt::Display for GridSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridSide::Long => write!(f, "Long"),
            GridSide::Short => write!(f, "Short"),
            GridSide::Neutral => write!(f, "Neutral"),
        }
    }
}

impl std::str::FromStr for GridSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "long" => Ok(GridSide::Long),
            "short" => Ok(GridSide::Short),
            "neutral" => Ok(GridSide::Neutral),
            other => Err(format!("unknown grid side '{}'", other)),
        }
    }
}

/// Direction of a simulated position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }

    /// Price direction that opens a position on this side
    pub fn entry_direction(self) -> CrossDirection {
        match self {
            PositionSide::Long => CrossDirection::Down,
            PositionSide::Short => CrossDirection::Up,
        }
    }

    /// Price direction that takes profit on this side
    pub fn exit_direction(self) -> CrossDirection {
        self.entry_direction().reversed()
    }

    pub fn label(self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

/// Direction in which price moved through a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossDirection {
    Up,
    Down,
}

impl CrossDirection {
    pub fn reversed(self) -> Self {
        match self {
            CrossDirection::Up => CrossDirection::Down,
            CrossDirection::Down => CrossDirection::Up,
        }
    }
}

impl std::str::FromStr for CrossDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(CrossDirection::Up),
            "down" => Ok(CrossDirection::Down),
            other => Err(format!("unknown direction '{}', expected up or down", other)),
        }
    }
}

/// A single observed price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Whether a fill opened or closed exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillKind {
    Open,
    Close,
}

/// Append-only audit record of a simulated fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: FillKind,
    pub side: PositionSide,
    pub entry_price: f64,
    /// Set on closes only
    pub exit_price: Option<f64>,
    /// Set on opens only
    pub take_profit: Option<f64>,
    pub qty: f64,
    /// Net of fees, set on closes only
    pub realized_pnl: Option<Money>,
    pub fee: Money,
}

impl FillRecord {
    pub fn is_close(&self) -> bool {
        self.kind == FillKind::Close
    }
}

/// Currently open simulated exposure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: PositionSide,
    pub entry_price: f64,
    pub qty: f64,
    pub take_profit: f64,
}

impl OpenPosition {
    /// Mark-to-market PnL before leverage and fees
    pub fn raw_pnl_at(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.qty * self.side.sign()
    }
}

/// Realized PnL and fees, kept in decimal so per-trade amounts sum exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(#[serde(with = "rust_decimal::serde::str")] Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// NaN and infinities become zero
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Money::ZERO;
        }
        Money(
            Decimal::try_from(value)
                .or_else(|_| Decimal::from_f64_retain(value).ok_or(()))
                .unwrap_or(Decimal::ZERO),
        )
    }

    pub fn to_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn round_dp(self, dp: u32) -> Self {
        Money(self.0.round_dp(dp))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}
