//! PnL and equity aggregation
//!
//! All PnL is scaled by leverage: the effective exposure of a fill is
//! `qty × leverage`, for realized and unrealized PnL alike. The taker fee on a
//! close is `fee_rate × (entry + exit) × effective qty`.
//!
//! Unrealized PnL is recomputed from scratch on every call, never carried.

use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::grid::Grid;
use crate::{Money, OpenPosition, PositionSide};

/// Leverage and fee convention shared by every PnL calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnlModel {
    pub leverage: f64,
    pub fee_rate: f64,
}

/// Result of closing exposure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedPnl {
    pub gross: Money,
    pub fee: Money,
    pub net: Money,
}

impl PnlModel {
    pub fn new(leverage: u32, fee_rate: f64) -> Self {
        Self {
            leverage: leverage as f64,
            fee_rate,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(config.leverage, config.fee_rate)
    }

    pub fn effective_qty(&self, qty: f64) -> f64 {
        qty * self.leverage
    }

    /// PnL of closing `qty` opened at `entry` at `exit`
    pub fn close(&self, side: PositionSide, entry: f64, exit: f64, qty: f64) -> ClosedPnl {
        let eff = self.effective_qty(qty);
        let gross = Money::from_f64((exit - entry) * eff * side.sign());
        let fee = Money::from_f64(self.fee_rate * (entry + exit) * eff);
        ClosedPnl {
            gross,
            fee,
            net: gross - fee,
        }
    }

    /// Mark-to-market PnL of one open position
    pub fn unrealized(&self, position: &OpenPosition, price: f64) -> f64 {
        if position.qty <= 0.0 || !position.qty.is_finite() {
            return 0.0;
        }
        position.raw_pnl_at(price) * self.leverage
    }

    pub fn total_unrealized<'a>(
        &self,
        positions: impl IntoIterator<Item = &'a OpenPosition>,
        price: f64,
    ) -> f64 {
        positions
            .into_iter()
            .map(|p| self.unrealized(p, price))
            .sum()
    }
}

/// Account figures exposed for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub margin: f64,
    pub realized_pnl: Money,
    pub unrealized_pnl: f64,
    pub equity: f64,
}

impl AccountSummary {
    pub fn compute(
        margin: f64,
        realized_pnl: Money,
        positions: &[OpenPosition],
        price: f64,
        model: &PnlModel,
    ) -> Self {
        let unrealized_pnl = model.total_unrealized(positions, price);
        Self {
            margin,
            realized_pnl,
            unrealized_pnl,
            equity: margin + realized_pnl.to_f64() + unrealized_pnl,
        }
    }
}

/// What the book would make if price reached the next take-profit level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TpPreview {
    pub side: PositionSide,
    pub avg_entry: f64,
    pub next_tp: f64,
    pub distance: f64,
    pub qty: f64,
    pub expected_pnl_at_tp: Money,
}

/// Preview for the side holding the larger quantity. `None` when flat.
pub fn tp_preview(
    positions: &[OpenPosition],
    grid: &Grid,
    price: f64,
    model: &PnlModel,
) -> Option<TpPreview> {
    let side_qty = |side: PositionSide| -> f64 {
        positions
            .iter()
            .filter(|p| p.side == side && p.qty > 0.0)
            .map(|p| p.qty)
            .sum()
    };

    let long_qty = side_qty(PositionSide::Long);
    let short_qty = side_qty(PositionSide::Short);
    let (side, qty) = if long_qty >= short_qty {
        (PositionSide::Long, long_qty)
    } else {
        (PositionSide::Short, short_qty)
    };
    if qty <= 0.0 {
        return None;
    }

    let notional: f64 = positions
        .iter()
        .filter(|p| p.side == side && p.qty > 0.0)
        .map(|p| p.entry_price * p.qty)
        .sum();
    let avg_entry = notional / qty;
    let next_tp = grid.take_profit(side, avg_entry);

    Some(TpPreview {
        side,
        avg_entry,
        next_tp,
        distance: (next_tp - price).abs(),
        qty,
        expected_pnl_at_tp: model.close(side, avg_entry, next_tp, qty).net,
    })
}
