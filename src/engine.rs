//! Grid trading simulation engine
//!
//! Owns the configuration, the derived grid, the price series and the
//! position book for one run. Every call runs to completion before the
//! caller reads state; nothing here blocks or suspends.
//!
//! ## Evaluation order for one tick
//! 1. Take the previous price (last evaluated price, else the prior sample)
//! 2. Collect every level between previous and current price
//! 3. Open positions for levels whose entry side, judged at the previous
//!    price, matches the crossing direction. Entry is at the level itself.
//! 4. Close positions whose take-profit level was crossed back
//! 5. Book realized PnL and append the fills to the audit log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, EngineConfig, GridConfig, PositionMode};
use crate::crossing::levels_crossed;
use crate::equity::{tp_preview, AccountSummary, PnlModel, TpPreview};
use crate::error::{GridError, GridResult};
use crate::event_log::EventLog;
use crate::feed::PriceSource;
use crate::grid::Grid;
use crate::position::{create_book, FillContext, PositionBook};
use crate::series::PriceSeries;
use crate::{CrossDirection, FillRecord, GridSide, Money, OpenPosition};

/// Synthetic ticks of `force_cross` land this fraction of a step from the level
pub const FORCE_CROSS_OFFSET: f64 = 0.1;

/// Fills produced by one evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub opened: Vec<FillRecord>,
    pub closed: Vec<FillRecord>,
}

impl ProcessOutcome {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }

    /// Net realized PnL of the closes in this outcome
    pub fn realized(&self) -> Money {
        self.closed.iter().filter_map(|f| f.realized_pnl).sum()
    }

    fn extend(&mut self, other: ProcessOutcome) {
        self.opened.extend(other.opened);
        self.closed.extend(other.closed);
    }
}

/// Read-only view of the engine for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: Option<DateTime<Utc>>,
    pub price: f64,
    pub side: GridSide,
    pub running: bool,
    pub range_min: f64,
    pub range_max: f64,
    pub step: f64,
    pub grid_levels: Vec<f64>,
    pub long_levels: Vec<f64>,
    pub short_levels: Vec<f64>,
    pub open_positions: Vec<OpenPosition>,
    pub margin: f64,
    pub realized_pnl: Money,
    pub unrealized_pnl: f64,
    pub equity: f64,
    pub fill_count: usize,
    pub tp_preview: Option<TpPreview>,
}

pub struct GridEngine {
    config: GridConfig,
    grid: Grid,
    model: PnlModel,
    series: PriceSeries,
    book: Box<dyn PositionBook>,
    fills: Vec<FillRecord>,
    realized: Money,
    /// Last price handed to `process`
    cursor: Option<f64>,
    running: bool,
    next_fill_id: u64,
    log: EventLog,
}

impl std::fmt::Debug for GridEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridEngine")
            .field("config", &self.config)
            .field("mode", &self.book.mode())
            .field("price", &self.series.current())
            .field("positions", &self.book.positions().len())
            .field("realized", &self.realized)
            .field("running", &self.running)
            .finish()
    }
}

impl GridEngine {
    /// Create an engine. The position mode is fixed for its lifetime.
    pub fn new(config: GridConfig, engine: EngineConfig) -> GridResult<Self> {
        let grid = Grid::build(&config)?;
        let series = PriceSeries::with_initial(engine.max_samples, engine.initial_price)?;
        let model = PnlModel::from_config(&config);

        info!(
            side = %config.side,
            grid_count = config.grid_count,
            range_min = config.range_min,
            range_max = config.range_max,
            mode = ?engine.position_mode,
            "Grid engine created"
        );

        Ok(Self {
            config,
            grid,
            model,
            series,
            book: create_book(engine.position_mode),
            fills: Vec::new(),
            realized: Money::ZERO,
            cursor: None,
            running: false,
            next_fill_id: 1,
            log: EventLog::new(engine.log_capacity),
        })
    }

    pub fn from_config(config: &Config) -> GridResult<Self> {
        Self::new(config.grid.clone(), config.engine.clone())
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Replace the configuration. The grid is rebuilt before anything else
    /// can read it; on error nothing changes.
    pub fn configure(&mut self, config: GridConfig) -> GridResult<()> {
        let grid = Grid::build(&config).inspect_err(|e| {
            warn!("Rejected grid config: {}", e);
        })?;
        self.model = PnlModel::from_config(&config);
        self.grid = grid;
        self.config = config;
        info!(
            side = %self.config.side,
            grid_count = self.config.grid_count,
            range_min = format!("{:.2}", self.config.range_min),
            range_max = format!("{:.2}", self.config.range_max),
            "Grid configured"
        );
        self.log.push(format!(
            "Config: {} {}x, {} grids, range {:.2}-{:.2}",
            self.config.side,
            self.config.leverage,
            self.config.grid_count,
            self.config.range_min,
            self.config.range_max
        ));
        Ok(())
    }

    /// Regenerate levels from the current configuration
    pub fn rebuild_grid(&mut self) -> GridResult<()> {
        self.grid = Grid::build(&self.config)?;
        debug!(levels = self.grid.len(), "Grid rebuilt");
        self.log.push("Grid rebuilt.");
        Ok(())
    }

    /// Move the range by `step_shift`. Open positions keep their entry and
    /// take-profit prices.
    pub fn shift_grid(&mut self, direction: CrossDirection) -> GridResult<()> {
        let delta = match direction {
            CrossDirection::Up => self.config.step_shift,
            CrossDirection::Down => -self.config.step_shift,
        };
        let shifted = self.config.shifted(delta);
        self.configure(shifted)?;
        self.rebuild_grid()?;
        info!(delta, "Grid shifted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ticks
    // ------------------------------------------------------------------

    pub fn push_tick(&mut self, price: f64) -> GridResult<()> {
        self.series.push(price)
    }

    pub fn push_tick_at(&mut self, timestamp: DateTime<Utc>, price: f64) -> GridResult<()> {
        self.series.push_at(timestamp, price)
    }

    /// Run crossing detection and the fill engine once against `current_price`.
    ///
    /// The previous/current pair is consumed: calling again with the same
    /// price sees no movement and produces no fills.
    pub fn process(&mut self, current_price: f64) -> GridResult<ProcessOutcome> {
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(GridError::InvalidPrice(current_price));
        }

        let prev = match self.cursor.or_else(|| self.series.previous()) {
            Some(p) => p,
            None => {
                self.cursor = Some(current_price);
                return Ok(ProcessOutcome::default());
            }
        };
        self.cursor = Some(current_price);

        if prev == current_price {
            return Ok(ProcessOutcome::default());
        }

        let timestamp = self
            .series
            .last_sample()
            .map(|s| s.timestamp)
            .unwrap_or_else(Utc::now);

        let mut ctx = FillContext::new(
            &self.grid,
            self.model,
            self.config.qty_per_level,
            timestamp,
            &mut self.next_fill_id,
        );

        for (level, direction) in levels_crossed(prev, current_price, self.grid.levels()) {
            debug!(
                level = format!("{:.2}", level),
                ?direction,
                prev = format!("{:.2}", prev),
                curr = format!("{:.2}", current_price),
                "Level crossed"
            );
            // Classification is judged at the price the move started from
            match self.grid.entry_side(level, prev) {
                Some(side) if side.entry_direction() == direction => {
                    self.book.on_entry(&mut ctx, side, level);
                }
                _ => {}
            }
        }

        self.book.on_move(&mut ctx, prev, current_price);

        let realized = ctx.realized();
        let outcome = ProcessOutcome {
            opened: ctx.opened,
            closed: ctx.closed,
        };

        self.realized += realized;
        for fill in &outcome.opened {
            self.log.push(format!(
                "{} filled @ {:.2} -> TP {:.2}",
                fill.side.label(),
                fill.entry_price,
                fill.take_profit.unwrap_or(fill.entry_price)
            ));
        }
        for fill in &outcome.closed {
            self.log.push(format!(
                "{} TP @ {:.2} ({:+.2})",
                fill.side.label(),
                fill.exit_price.unwrap_or(fill.entry_price),
                fill.realized_pnl.unwrap_or(Money::ZERO).to_f64()
            ));
        }
        self.fills.extend(outcome.opened.iter().cloned());
        self.fills.extend(outcome.closed.iter().cloned());

        Ok(outcome)
    }

    /// Record a tick and, while running, evaluate it.
    ///
    /// Ticks recorded while stopped are consumed without fills so that a
    /// later start does not replay the move.
    pub fn tick(&mut self, price: f64) -> GridResult<ProcessOutcome> {
        self.push_tick(price)?;
        if self.running {
            self.process(price)
        } else {
            self.cursor = Some(price);
            Ok(ProcessOutcome::default())
        }
    }

    /// Tick with the next quote from `source`. No quote means no tick: the
    /// series, the book and the fill log are left as they were.
    pub fn poll(&mut self, source: &mut dyn PriceSource) -> GridResult<Option<ProcessOutcome>> {
        match source.next_price() {
            Some(price) => self.tick(price).map(Some),
            None => {
                debug!(source = source.name(), "No quote, skipping tick");
                Ok(None)
            }
        }
    }

    /// Push two synthetic ticks that bracket the nearest level in `direction`:
    /// one just on the near side, one just past it.
    pub fn force_cross(&mut self, direction: CrossDirection) -> GridResult<ProcessOutcome> {
        let price = self.price();
        let target = match direction {
            CrossDirection::Down => self.grid.level_below(price),
            CrossDirection::Up => self.grid.level_above(price),
        };
        let Some(level) = target else {
            warn!(?direction, price, "No grid level to force-cross");
            return Ok(ProcessOutcome::default());
        };

        let offset = self.grid.step() * FORCE_CROSS_OFFSET;
        let (near, far) = match direction {
            CrossDirection::Down => (level + offset, level - offset),
            CrossDirection::Up => (level - offset, level + offset),
        };
        let far = if far > 0.0 { far } else { level * 0.5 };
        let near = if near > 0.0 { near } else { level * 0.5 };

        info!(
            ?direction,
            level = format!("{:.2}", level),
            "Forcing grid cross"
        );
        self.log.push(format!(
            "Force cross {:?} through {:.2}",
            direction, level
        ));

        let mut outcome = ProcessOutcome::default();
        for synthetic in [near, far] {
            self.push_tick(synthetic)?;
            outcome.extend(self.process(synthetic)?);
        }
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn start(&mut self) -> GridResult<()> {
        self.rebuild_grid()?;
        self.running = true;
        self.cursor = self.series.current();
        info!("Grid bot started");
        self.log.push("Bot started.");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running = false;
        info!("Grid bot stopped");
        self.log.push("Bot stopped.");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Clear positions, fills, realized PnL and the event log
    pub fn reset(&mut self) {
        self.book.clear();
        self.fills.clear();
        self.realized = Money::ZERO;
        self.log.clear();
        self.cursor = self.series.current();
        info!("Grid engine reset");
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn series(&self) -> &PriceSeries {
        &self.series
    }

    pub fn position_mode(&self) -> PositionMode {
        self.book.mode()
    }

    pub fn fills(&self) -> &[FillRecord] {
        &self.fills
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn open_positions(&self) -> Vec<OpenPosition> {
        self.book.positions()
    }

    /// Latest sample in the series
    pub fn price(&self) -> f64 {
        self.series.current().unwrap_or(self.config.midpoint())
    }

    pub fn realized_pnl(&self) -> Money {
        self.realized
    }

    pub fn account(&self) -> AccountSummary {
        AccountSummary::compute(
            self.config.margin,
            self.realized,
            &self.book.positions(),
            self.price(),
            &self.model,
        )
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.account().unrealized_pnl
    }

    pub fn equity(&self) -> f64 {
        self.account().equity
    }

    pub fn tp_preview(&self) -> Option<TpPreview> {
        tp_preview(&self.book.positions(), &self.grid, self.price(), &self.model)
    }

    pub fn snapshot(&self) -> Snapshot {
        let price = self.price();
        let positions = self.book.positions();
        let account =
            AccountSummary::compute(self.config.margin, self.realized, &positions, price, &self.model);
        let partition = self.grid.partition(price);
        let (range_min, range_max) = self.grid.range();

        Snapshot {
            timestamp: self.series.last_sample().map(|s| s.timestamp),
            price,
            side: self.config.side,
            running: self.running,
            range_min,
            range_max,
            step: self.grid.step(),
            grid_levels: self.grid.levels().to_vec(),
            long_levels: partition.long,
            short_levels: partition.short,
            tp_preview: tp_preview(&positions, &self.grid, price, &self.model),
            open_positions: positions,
            margin: account.margin,
            realized_pnl: account.realized_pnl,
            unrealized_pnl: account.unrealized_pnl,
            equity: account.equity,
            fill_count: self.fills.len(),
        }
    }
}
