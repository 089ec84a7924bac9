//! One independent position per grid level

use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

use super::{FillContext, PositionBook};
use crate::config::PositionMode;
use crate::crossing::crossed;
use crate::{OpenPosition, PositionSide};

/// Positions keyed by the level they were opened at
#[derive(Debug, Default)]
pub struct PerLevelBook {
    positions: BTreeMap<OrderedFloat<f64>, OpenPosition>,
}

impl PerLevelBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, level: f64) -> Option<&OpenPosition> {
        self.positions.get(&OrderedFloat(level))
    }
}

impl PositionBook for PerLevelBook {
    fn mode(&self) -> PositionMode {
        PositionMode::PerLevel
    }

    fn on_entry(&mut self, ctx: &mut FillContext<'_>, side: PositionSide, level: f64) {
        let key = OrderedFloat(level);
        if let Some(existing) = self.positions.get(&key) {
            tracing::debug!(
                level = format!("{:.2}", level),
                open_side = existing.side.label(),
                "Level already open, skipping"
            );
            return;
        }

        let take_profit = ctx.grid.take_profit(side, level);
        let position = OpenPosition {
            side,
            entry_price: level,
            qty: ctx.qty_per_level,
            take_profit,
        };
        self.positions.insert(key, position);
        ctx.record_open(side, level, take_profit, position.qty);
    }

    fn on_move(&mut self, ctx: &mut FillContext<'_>, prev: f64, curr: f64) {
        let hit: Vec<OrderedFloat<f64>> = self
            .positions
            .iter()
            .filter(|(_, p)| crossed(prev, curr, p.take_profit, p.side.exit_direction()))
            .map(|(k, _)| *k)
            .collect();

        for key in hit {
            if let Some(p) = self.positions.remove(&key) {
                ctx.record_close(p.side, p.entry_price, p.take_profit, p.qty);
            }
        }
    }

    fn positions(&self) -> Vec<OpenPosition> {
        self.positions.values().copied().collect()
    }

    fn clear(&mut self) {
        self.positions.clear();
    }
}
