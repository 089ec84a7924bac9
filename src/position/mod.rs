//! Simulated position bookkeeping
//!
//! Two representations exist and one is chosen per engine instance:
//! - [`PerLevelBook`]: an independent position per grid level, at most one
//!   per level, each closed at its own take-profit level
//! - [`AveragedBook`]: a single net position with weighted-average entry,
//!   flipped through zero when an opposite fill exceeds it

mod averaged;
mod per_level;

pub use averaged::AveragedBook;
pub use per_level::PerLevelBook;

use chrono::{DateTime, Utc};

use crate::config::PositionMode;
use crate::equity::PnlModel;
use crate::grid::Grid;
use crate::{FillKind, FillRecord, Money, OpenPosition, PositionSide};

/// Quantities at or below this are treated as no position
pub const QTY_EPSILON: f64 = 1e-12;

/// Shared state for one evaluation pass: the grid and PnL convention in
/// force, plus the fills produced so far.
pub struct FillContext<'a> {
    pub grid: &'a Grid,
    pub model: PnlModel,
    pub qty_per_level: f64,
    pub timestamp: DateTime<Utc>,
    next_id: &'a mut u64,
    pub opened: Vec<FillRecord>,
    pub closed: Vec<FillRecord>,
}

impl<'a> FillContext<'a> {
    pub fn new(
        grid: &'a Grid,
        model: PnlModel,
        qty_per_level: f64,
        timestamp: DateTime<Utc>,
        next_id: &'a mut u64,
    ) -> Self {
        Self {
            grid,
            model,
            qty_per_level,
            timestamp,
            next_id,
            opened: Vec::new(),
            closed: Vec::new(),
        }
    }

    fn take_id(&mut self) -> u64 {
        let id = *self.next_id;
        *self.next_id += 1;
        id
    }

    pub fn record_open(&mut self, side: PositionSide, entry: f64, take_profit: f64, qty: f64) {
        let id = self.take_id();
        tracing::info!(
            side = side.label(),
            entry = format!("{:.2}", entry),
            take_profit = format!("{:.2}", take_profit),
            qty,
            "Grid fill"
        );
        self.opened.push(FillRecord {
            id,
            timestamp: self.timestamp,
            kind: FillKind::Open,
            side,
            entry_price: entry,
            exit_price: None,
            take_profit: Some(take_profit),
            qty,
            realized_pnl: None,
            fee: Money::ZERO,
        });
    }

    /// Record a close and return its net PnL
    pub fn record_close(&mut self, side: PositionSide, entry: f64, exit: f64, qty: f64) -> Money {
        let id = self.take_id();
        let pnl = self.model.close(side, entry, exit, qty);
        tracing::info!(
            side = side.label(),
            entry = format!("{:.2}", entry),
            exit = format!("{:.2}", exit),
            pnl = %pnl.net.round_dp(2),
            "Grid take-profit"
        );
        self.closed.push(FillRecord {
            id,
            timestamp: self.timestamp,
            kind: FillKind::Close,
            side,
            entry_price: entry,
            exit_price: Some(exit),
            take_profit: None,
            qty,
            realized_pnl: Some(pnl.net),
            fee: pnl.fee,
        });
        pnl.net
    }

    /// Sum of net PnL over the closes recorded in this pass
    pub fn realized(&self) -> Money {
        self.closed.iter().filter_map(|f| f.realized_pnl).sum()
    }
}

/// Position representation used by the engine
pub trait PositionBook: Send {
    fn mode(&self) -> PositionMode;

    /// A level classified as `side` was crossed in that side's entry direction
    fn on_entry(&mut self, ctx: &mut FillContext<'_>, side: PositionSide, level: f64);

    /// Close every position whose take-profit was crossed between `prev` and `curr`
    fn on_move(&mut self, ctx: &mut FillContext<'_>, prev: f64, curr: f64);

    /// Open exposure, ordered by entry price
    fn positions(&self) -> Vec<OpenPosition>;

    fn clear(&mut self);

    fn is_flat(&self) -> bool {
        self.positions().is_empty()
    }
}

/// Create the book for a position mode
pub fn create_book(mode: PositionMode) -> Box<dyn PositionBook> {
    match mode {
        PositionMode::PerLevel => Box::new(PerLevelBook::new()),
        PositionMode::Averaged => Box::new(AveragedBook::new()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::GridConfig;
    use crate::GridSide;

    /// 5 levels: 100, 110, 120, 130, 140
    pub fn grid() -> Grid {
        Grid::build(&GridConfig {
            side: GridSide::Neutral,
            grid_count: 5,
            range_min: 100.0,
            range_max: 140.0,
            ..GridConfig::default()
        })
        .unwrap()
    }

    pub fn model() -> PnlModel {
        PnlModel::new(1, 0.0)
    }
}
