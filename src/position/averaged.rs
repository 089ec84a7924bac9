//! Single net position with weighted-average entry
//!
//! Same-direction fills merge with
//! `new_avg = (old_avg * old_qty + price * qty) / (old_qty + qty)`.
//! An opposite fill first realizes PnL on the closed quantity at the fill
//! price, then opens any residual in the new direction at that same price.

use super::{FillContext, PositionBook, QTY_EPSILON};
use crate::config::PositionMode;
use crate::crossing::crossed;
use crate::{OpenPosition, PositionSide};

#[derive(Debug, Default)]
pub struct AveragedBook {
    position: Option<OpenPosition>,
}

impl AveragedBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        self.position.as_ref()
    }

    fn open_fresh(&mut self, ctx: &mut FillContext<'_>, side: PositionSide, price: f64, qty: f64) {
        let take_profit = ctx.grid.take_profit(side, price);
        self.position = Some(OpenPosition {
            side,
            entry_price: price,
            qty,
            take_profit,
        });
        ctx.record_open(side, price, take_profit, qty);
    }
}

/// Weighted average of two lots. `None` if the combined size is degenerate.
fn weighted_average(avg: f64, qty: f64, price: f64, fill_qty: f64) -> Option<f64> {
    let total = qty + fill_qty;
    if total <= QTY_EPSILON || !total.is_finite() {
        return None;
    }
    Some((avg * qty + price * fill_qty) / total)
}

impl PositionBook for AveragedBook {
    fn mode(&self) -> PositionMode {
        PositionMode::Averaged
    }

    fn on_entry(&mut self, ctx: &mut FillContext<'_>, side: PositionSide, level: f64) {
        let fill_qty = ctx.qty_per_level;

        let Some(mut pos) = self.position.filter(|p| p.qty > QTY_EPSILON) else {
            self.open_fresh(ctx, side, level, fill_qty);
            return;
        };

        if pos.side == side {
            match weighted_average(pos.entry_price, pos.qty, level, fill_qty) {
                Some(avg) => {
                    pos.entry_price = avg;
                    pos.qty += fill_qty;
                    pos.take_profit = ctx.grid.take_profit(side, avg);
                    self.position = Some(pos);
                    ctx.record_open(side, level, pos.take_profit, fill_qty);
                }
                None => {
                    self.position = None;
                }
            }
            return;
        }

        // Opposite fill: reduce, close, or flip
        let closed_qty = pos.qty.min(fill_qty);
        ctx.record_close(pos.side, pos.entry_price, level, closed_qty);

        let remaining = pos.qty - closed_qty;
        let residual = fill_qty - closed_qty;

        if remaining > QTY_EPSILON {
            pos.qty = remaining;
            self.position = Some(pos);
        } else if residual > QTY_EPSILON {
            tracing::debug!(
                from = pos.side.label(),
                to = side.label(),
                price = format!("{:.2}", level),
                "Position flip"
            );
            self.open_fresh(ctx, side, level, residual);
        } else {
            self.position = None;
        }
    }

    fn on_move(&mut self, ctx: &mut FillContext<'_>, prev: f64, curr: f64) {
        let Some(pos) = self.position else {
            return;
        };
        if pos.qty <= QTY_EPSILON {
            self.position = None;
            return;
        }
        if crossed(prev, curr, pos.take_profit, pos.side.exit_direction()) {
            ctx.record_close(pos.side, pos.entry_price, pos.take_profit, pos.qty);
            self.position = None;
        }
    }

    fn positions(&self) -> Vec<OpenPosition> {
        self.position
            .iter()
            .filter(|p| p.qty > QTY_EPSILON)
            .copied()
            .collect()
    }

    fn clear(&mut self) {
        self.position = None;
    }
}
