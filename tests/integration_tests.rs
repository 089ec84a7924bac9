//! Integration tests for the grid trading simulator
//!
//! These tests drive the engine through its public API only.

use approx::assert_relative_eq;
use rust_decimal_macros::dec;

use grid_sim::crossing::{crossed_down, crossed_up, crossing_direction};
use grid_sim::feed::{PriceSource, SimulatedFeed};
use grid_sim::series::PriceSeries;
use grid_sim::{
    CrossDirection, EngineConfig, FillKind, Grid, GridConfig, GridEngine, GridError, GridSide,
    Money, NeutralPartition, PositionMode, PositionSide, ProcessOutcome, SharedEngine,
};

// =============================================================================
// Test Utilities
// =============================================================================

/// 60000..64000 with 8 levels, step 571.43
fn btc_config(side: GridSide) -> GridConfig {
    GridConfig {
        side,
        grid_count: 8,
        range_min: 60_000.0,
        range_max: 64_000.0,
        ..GridConfig::default()
    }
}

/// 100..140 with 5 levels, step 10, unit qty and leverage
fn small_config(side: GridSide) -> GridConfig {
    GridConfig {
        side,
        grid_count: 5,
        range_min: 100.0,
        range_max: 140.0,
        leverage: 1,
        qty_per_level: 1.0,
        step_shift: 5.0,
        ..GridConfig::default()
    }
}

fn engine_with(grid: GridConfig, mode: PositionMode, initial_price: f64) -> GridEngine {
    let engine = EngineConfig {
        position_mode: mode,
        initial_price,
        ..EngineConfig::default()
    };
    GridEngine::new(grid, engine).unwrap()
}

fn feed(engine: &mut GridEngine, price: f64) -> ProcessOutcome {
    engine.push_tick(price).unwrap();
    engine.process(price).unwrap()
}

/// Deterministic zig-zag walk that repeatedly sweeps the grid
fn generate_walk(count: usize, base: f64, amplitude: f64) -> Vec<f64> {
    let mut prices = Vec::with_capacity(count);
    let mut price = base;
    for i in 0..count {
        let noise = ((i * 17 + 31) % 100) as f64 / 100.0 - 0.5;
        let swing = if (i / 25) % 2 == 0 { -1.0 } else { 1.0 };
        price = (price + swing * amplitude * 0.1 + noise * amplitude * 0.2).max(1.0);
        prices.push(price);
    }
    prices
}

fn assert_equity_identity(engine: &GridEngine) {
    let snap = engine.snapshot();
    assert_eq!(
        snap.equity,
        snap.margin + snap.realized_pnl.to_f64() + snap.unrealized_pnl
    );
}

fn assert_conservation(engine: &GridEngine) {
    let closed: Money = engine
        .fills()
        .iter()
        .filter(|f| f.kind == FillKind::Close)
        .filter_map(|f| f.realized_pnl)
        .sum();
    assert_eq!(closed, engine.realized_pnl());
}

// =============================================================================
// Grid Builder Tests
// =============================================================================

#[test]
fn test_levels_count_bounds_and_order() {
    for grid_count in 2..40 {
        for (min, max) in [(1.0, 2.0), (60_000.0, 64_000.0), (0.5, 12_345.678)] {
            let cfg = GridConfig {
                grid_count,
                range_min: min,
                range_max: max,
                ..GridConfig::default()
            };
            let grid = Grid::build(&cfg).unwrap();
            let levels = grid.levels();
            assert_eq!(levels.len(), grid_count);
            assert_eq!(levels[0], min);
            assert_eq!(levels[grid_count - 1], max);
            assert!(levels.iter().all(|&l| (min..=max).contains(&l)));
            assert!(levels.windows(2).all(|w| w[0] <= w[1]));
            assert_relative_eq!(grid.min_spacing(), grid.step(), max_relative = 1e-9);
        }
    }
}

#[test]
fn test_eight_level_ladder() {
    let grid = Grid::build(&btc_config(GridSide::Neutral)).unwrap();
    assert_relative_eq!(grid.step(), 571.428_571, epsilon = 1e-5);
    assert_relative_eq!(grid.levels()[3], 61_714.285_714, epsilon = 1e-5);
    assert_relative_eq!(grid.levels()[4], 62_285.714_285, epsilon = 1e-5);
}

#[test]
fn test_invalid_configs_are_rejected() {
    let base = GridConfig::default();
    let cases = vec![
        GridConfig { grid_count: 0, ..base.clone() },
        GridConfig { grid_count: 1, ..base.clone() },
        GridConfig { range_min: 64_000.0, range_max: 60_000.0, ..base.clone() },
        GridConfig { range_min: 60_000.0, range_max: 60_000.0, ..base.clone() },
        GridConfig { range_min: f64::NAN, ..base.clone() },
        GridConfig { leverage: 0, ..base.clone() },
        GridConfig { margin: -1.0, ..base.clone() },
        GridConfig { fee_rate: -0.001, ..base.clone() },
        GridConfig { qty_per_level: 0.0, ..base.clone() },
        GridConfig { step_shift: 0.0, ..base.clone() },
    ];
    for cfg in cases {
        let err = Grid::build(&cfg).unwrap_err();
        assert!(err.is_configuration(), "{:?} should be a config error", cfg);
    }
}

#[test]
fn test_configure_rejection_leaves_engine_untouched() {
    let mut engine = engine_with(btc_config(GridSide::Neutral), PositionMode::PerLevel, 62_000.0);
    let levels = engine.grid().levels().to_vec();

    let err = engine
        .configure(GridConfig {
            range_max: 50_000.0,
            ..btc_config(GridSide::Long)
        })
        .unwrap_err();
    assert!(matches!(err, GridError::InvalidRange { .. }));
    assert_eq!(engine.config().side, GridSide::Neutral);
    assert_eq!(engine.grid().levels(), levels.as_slice());
}

#[test]
fn test_midpoint_level_goes_short_in_static_neutral() {
    let cfg = GridConfig {
        neutral_partition: NeutralPartition::Static,
        ..small_config(GridSide::Neutral)
    };
    let grid = Grid::build(&cfg).unwrap();
    let split = grid.partition(125.0);
    assert_eq!(split.long, vec![100.0, 110.0]);
    assert_eq!(split.short, vec![120.0, 130.0, 140.0]);
}

// =============================================================================
// Crossing Detector Tests
// =============================================================================

#[test]
fn test_crossing_predicates_match_definition() {
    let prices = [98.0, 99.5, 100.0, 100.5, 102.0];
    let level = 100.0;
    for &prev in &prices {
        for &curr in &prices {
            assert_eq!(crossed_down(prev, curr, level), prev > level && curr <= level);
            assert_eq!(crossed_up(prev, curr, level), prev < level && curr >= level);
            let forward = crossing_direction(prev, curr, level);
            let backward = crossing_direction(curr, prev, level);
            if prev != level && curr != level {
                assert_eq!(forward.map(CrossDirection::reversed), backward);
            }
        }
    }
}

// =============================================================================
// Engine Scenario Tests
// =============================================================================

#[test]
fn test_neutral_dynamic_falling_ticks_open_longs() {
    let mut engine = engine_with(btc_config(GridSide::Neutral), PositionMode::PerLevel, 62_000.0);
    engine.start().unwrap();

    let first = engine.tick(61_000.0).unwrap();
    let entries: Vec<f64> = first.opened.iter().map(|f| f.entry_price).collect();
    assert_eq!(entries.len(), 2);
    assert_relative_eq!(entries[0], 61_714.285_714, epsilon = 1e-5);
    assert_relative_eq!(entries[1], 61_142.857_142, epsilon = 1e-5);
    assert!(first.opened.iter().all(|f| f.side == PositionSide::Long));

    let second = engine.tick(60_500.0).unwrap();
    assert_eq!(second.opened.len(), 1);
    assert_relative_eq!(second.opened[0].entry_price, 60_571.428_571, epsilon = 1e-5);

    assert!(engine.fills().iter().all(|f| f.kind == FillKind::Open));
    assert_eq!(engine.open_positions().len(), 3);
    assert_eq!(engine.realized_pnl(), Money::from(dec!(0)));
    assert!(engine.unrealized_pnl() < 0.0);
    assert_equity_identity(&engine);
}

#[test]
fn test_force_cross_round_trip_realizes_profit() {
    let mut engine = engine_with(btc_config(GridSide::Long), PositionMode::PerLevel, 62_000.0);

    let down = engine.force_cross(CrossDirection::Down).unwrap();
    assert_eq!(down.opened.len(), 1);
    assert!(down.closed.is_empty());
    assert_relative_eq!(down.opened[0].entry_price, 61_714.285_714, epsilon = 1e-5);
    let tp = down.opened[0].take_profit.unwrap();
    assert_relative_eq!(tp, 62_285.714_285, epsilon = 1e-5);

    // First up-cross only recrosses the entry level
    let up = engine.force_cross(CrossDirection::Up).unwrap();
    assert!(up.is_empty());

    // Second up-cross brackets the take-profit level
    let up = engine.force_cross(CrossDirection::Up).unwrap();
    assert!(up.opened.is_empty());
    assert_eq!(up.closed.len(), 1);
    assert!(up.realized().is_positive());
    assert_relative_eq!(up.closed[0].exit_price.unwrap(), tp);

    assert_eq!(engine.fills().len(), 2);
    assert!(engine.open_positions().is_empty());
    assert_conservation(&engine);
}

#[test]
fn test_shift_up_moves_range_but_not_positions() {
    let mut engine = engine_with(btc_config(GridSide::Neutral), PositionMode::PerLevel, 62_000.0);
    feed(&mut engine, 61_000.0);
    let entries: Vec<f64> = engine.open_positions().iter().map(|p| p.entry_price).collect();

    let step_shift = engine.config().step_shift;
    engine.shift_grid(CrossDirection::Up).unwrap();

    assert_eq!(engine.config().range_min, 60_000.0 + step_shift);
    assert_eq!(engine.config().range_max, 64_000.0 + step_shift);
    assert_eq!(engine.grid().levels()[0], 60_000.0 + step_shift);
    assert_eq!(engine.grid().len(), 8);
    let after: Vec<f64> = engine.open_positions().iter().map(|p| p.entry_price).collect();
    assert_eq!(after, entries);
    assert_eq!(engine.log().recent(1)[0].message, "Grid rebuilt.");
}

#[test]
fn test_shift_down_stops_before_nonpositive_range() {
    let mut engine = engine_with(small_config(GridSide::Neutral), PositionMode::PerLevel, 125.0);
    feed(&mut engine, 105.0);
    let entries: Vec<f64> = engine.open_positions().iter().map(|p| p.entry_price).collect();

    engine.shift_grid(CrossDirection::Down).unwrap();
    assert_eq!(engine.grid().range(), (95.0, 135.0));
    assert_eq!(engine.grid().levels(), &[95.0, 105.0, 115.0, 125.0, 135.0]);
    let after: Vec<f64> = engine.open_positions().iter().map(|p| p.entry_price).collect();
    assert_eq!(after, entries);

    let mut shifts = 1;
    let err = loop {
        match engine.shift_grid(CrossDirection::Down) {
            Ok(()) => shifts += 1,
            Err(e) => break e,
        }
    };
    assert_eq!(shifts, 19);
    assert!(matches!(err, GridError::InvalidRange { min, max } if min == 0.0 && max == 40.0));

    // The rejected shift leaves the last valid ladder in place
    assert_eq!(engine.grid().range(), (5.0, 45.0));
    assert_eq!(engine.config().range_min, 5.0);
    assert_eq!(engine.grid().levels(), &[5.0, 15.0, 25.0, 35.0, 45.0]);
    assert_eq!(engine.open_positions().len(), entries.len());
}

#[test]
fn test_short_grid_round_trip() {
    let mut engine = engine_with(small_config(GridSide::Short), PositionMode::PerLevel, 115.0);
    engine.start().unwrap();

    let up = engine.tick(131.0).unwrap();
    assert!(up.closed.is_empty());
    let opened: Vec<(f64, Option<f64>)> = up
        .opened
        .iter()
        .map(|f| (f.entry_price, f.take_profit))
        .collect();
    assert_eq!(opened, vec![(120.0, Some(110.0)), (130.0, Some(120.0))]);
    assert!(up.opened.iter().all(|f| f.side == PositionSide::Short));
    assert!(engine.unrealized_pnl() < 0.0);

    let down = engine.tick(109.0).unwrap();
    assert!(down.opened.is_empty());
    assert_eq!(down.closed.len(), 2);
    assert_eq!(down.realized(), Money::from(dec!(20)));
    assert_eq!(engine.realized_pnl(), Money::from(dec!(20)));
    assert!(engine.open_positions().is_empty());
    assert_equity_identity(&engine);
    assert_conservation(&engine);
}

#[test]
fn test_short_grid_never_enters_below_midpoint() {
    let mut engine = engine_with(small_config(GridSide::Short), PositionMode::PerLevel, 125.0);
    // Sweeps roughly 84..144, through every level
    for price in generate_walk(500, 145.0, 20.0) {
        feed(&mut engine, price);
    }
    let opens: Vec<_> = engine.fills().iter().filter(|f| f.kind == FillKind::Open).collect();
    assert!(!opens.is_empty());
    assert!(opens
        .iter()
        .all(|f| f.side == PositionSide::Short && f.entry_price >= 120.0));
    assert_conservation(&engine);
}

#[test]
fn test_fast_move_fills_every_level() {
    let mut engine = engine_with(small_config(GridSide::Neutral), PositionMode::PerLevel, 125.0);

    feed(&mut engine, 105.0);
    assert_eq!(engine.open_positions().len(), 2);

    // One tick through three levels: 110 and 120 are already held, 130 opens
    // a short and both longs hit their take-profits
    let out = feed(&mut engine, 131.0);
    assert_eq!(out.opened.len(), 1);
    assert_eq!(out.opened[0].side, PositionSide::Short);
    assert_eq!(out.opened[0].entry_price, 130.0);
    assert_eq!(out.closed.len(), 2);
    assert_eq!(engine.realized_pnl(), Money::from(dec!(20)));

    let open = engine.open_positions();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].side, PositionSide::Short);
    assert_conservation(&engine);
}

#[test]
fn test_averaged_round_trip_nets_out() {
    let mut engine = engine_with(small_config(GridSide::Neutral), PositionMode::Averaged, 125.0);

    feed(&mut engine, 105.0);
    let open = engine.open_positions();
    assert_eq!(open.len(), 1);
    assert_relative_eq!(open[0].entry_price, 115.0);
    assert_relative_eq!(open[0].qty, 2.0);

    // Short entries at 110 and 120 unwind the long at a loss then a gain
    feed(&mut engine, 121.0);
    assert!(engine.open_positions().is_empty());
    let closes: Vec<Money> = engine
        .fills()
        .iter()
        .filter_map(|f| f.realized_pnl)
        .collect();
    assert_eq!(closes, vec![Money::from(dec!(-5)), Money::from(dec!(5))]);
    assert_eq!(engine.realized_pnl(), Money::ZERO);
    assert_conservation(&engine);
}

#[test]
fn test_leverage_scales_realized_and_unrealized() {
    let cfg = GridConfig {
        leverage: 10,
        ..small_config(GridSide::Long)
    };
    let mut engine = engine_with(cfg, PositionMode::PerLevel, 125.0);

    feed(&mut engine, 109.0);
    // Longs at 120 (mid) and 110, marked at 109
    assert_relative_eq!(engine.unrealized_pnl(), (-11.0 - 1.0) * 10.0, epsilon = 1e-9);

    feed(&mut engine, 130.0);
    // 110 -> 120 and 120 -> 130, each +10 per unit, times leverage
    assert_eq!(engine.realized_pnl(), Money::from(dec!(200)));
    assert_eq!(engine.unrealized_pnl(), 0.0);
}

#[test]
fn test_fees_reduce_realized_pnl() {
    let cfg = GridConfig {
        fee_rate: 0.001,
        ..small_config(GridSide::Long)
    };
    let mut engine = engine_with(cfg, PositionMode::PerLevel, 115.0);
    feed(&mut engine, 109.0);
    feed(&mut engine, 121.0);

    let close = engine.fills().iter().find(|f| f.is_close()).unwrap();
    // 10 gross minus 0.001 * (110 + 120)
    assert_relative_eq!(close.realized_pnl.unwrap().to_f64(), 9.77, epsilon = 1e-9);
    assert_relative_eq!(close.fee.to_f64(), 0.23, epsilon = 1e-9);
}

// =============================================================================
// Property Tests
// =============================================================================

#[test]
fn test_process_is_idempotent() {
    let mut engine = engine_with(btc_config(GridSide::Neutral), PositionMode::PerLevel, 62_000.0);
    for price in generate_walk(300, 62_000.0, 400.0) {
        engine.push_tick(price).unwrap();
        engine.process(price).unwrap();
        let fills = engine.fills().len();
        let again = engine.process(price).unwrap();
        assert!(again.is_empty());
        assert_eq!(engine.fills().len(), fills);
    }
}

#[test]
fn test_equity_identity_and_conservation_over_walks() {
    for mode in [PositionMode::PerLevel, PositionMode::Averaged] {
        for side in [GridSide::Long, GridSide::Short, GridSide::Neutral] {
            for seed in 0..5u64 {
                let cfg = GridConfig {
                    fee_rate: 0.0004,
                    ..btc_config(side)
                };
                let mut engine = engine_with(cfg, mode, 62_000.0);
                let mut walk = SimulatedFeed::new(62_000.0, 0.004, Some(seed)).unwrap();
                engine.start().unwrap();

                for _ in 0..400 {
                    let price = walk.next_price().unwrap();
                    engine.tick(price).unwrap();
                    assert_equity_identity(&engine);
                }
                assert_conservation(&engine);
            }
        }
    }
}

#[test]
fn test_per_level_never_holds_two_positions_at_one_level() {
    let mut engine = engine_with(small_config(GridSide::Neutral), PositionMode::PerLevel, 125.0);
    for price in generate_walk(500, 120.0, 30.0) {
        feed(&mut engine, price);
        let open = engine.open_positions();
        let mut entries: Vec<f64> = open.iter().map(|p| p.entry_price).collect();
        entries.dedup();
        assert_eq!(entries.len(), open.len());
    }
}

#[test]
fn test_averaged_holds_at_most_one_position() {
    let mut engine = engine_with(small_config(GridSide::Neutral), PositionMode::Averaged, 125.0);
    for price in generate_walk(500, 120.0, 30.0) {
        feed(&mut engine, price);
        assert!(engine.open_positions().len() <= 1);
    }
    assert_conservation(&engine);
}

// =============================================================================
// Price Source Tests
// =============================================================================

/// Source whose exchanges never answer
struct OfflineSource;

impl PriceSource for OfflineSource {
    fn next_price(&mut self) -> Option<f64> {
        None
    }

    fn name(&self) -> &str {
        "offline"
    }
}

#[test]
fn test_missing_quote_is_not_a_tick() {
    let mut engine = engine_with(small_config(GridSide::Neutral), PositionMode::PerLevel, 125.0);
    engine.start().unwrap();
    feed(&mut engine, 105.0);

    let series_len = engine.series().len();
    let fills = engine.fills().to_vec();
    let before = engine.snapshot();

    let mut source = OfflineSource;
    for _ in 0..5 {
        assert!(engine.poll(&mut source).unwrap().is_none());
    }

    assert_eq!(engine.series().len(), series_len);
    assert_eq!(engine.fills(), fills.as_slice());
    assert_eq!(engine.snapshot(), before);
}

#[test]
fn test_poll_ticks_with_simulated_quotes() {
    let mut engine = engine_with(btc_config(GridSide::Neutral), PositionMode::PerLevel, 62_000.0);
    let mut source = SimulatedFeed::new(62_000.0, 0.004, Some(7)).unwrap();
    engine.start().unwrap();

    for _ in 0..50 {
        assert!(engine.poll(&mut source).unwrap().is_some());
    }
    assert_eq!(engine.series().len(), 51);
    assert_conservation(&engine);
}

// =============================================================================
// Series and Session Tests
// =============================================================================

#[test]
fn test_series_keeps_most_recent_window() {
    let mut series = PriceSeries::new(10);
    for i in 1..=25 {
        series.push(i as f64).unwrap();
    }
    assert_eq!(series.len(), 10);
    assert_eq!(series.current(), Some(25.0));
    assert_eq!(series.previous(), Some(24.0));
    assert_eq!(series.iter().next().map(|s| s.price), Some(16.0));
    assert!(matches!(series.push(f64::NAN), Err(GridError::InvalidPrice(_))));
}

#[test]
fn test_shared_engine_advance() {
    let session = SharedEngine::new(engine_with(
        btc_config(GridSide::Neutral),
        PositionMode::PerLevel,
        62_000.0,
    ));
    session.with(|e| e.start()).unwrap();

    let (outcome, snapshot) = session.advance(61_000.0).unwrap();
    assert_eq!(outcome.opened.len(), 2);
    assert_eq!(snapshot.open_positions.len(), 2);
    assert_eq!(snapshot.price, 61_000.0);
    assert_eq!(snapshot.fill_count, 2);
    assert!(snapshot.tp_preview.is_some());
}

#[test]
fn test_snapshot_serializes() {
    let mut engine = engine_with(btc_config(GridSide::Neutral), PositionMode::PerLevel, 62_000.0);
    feed(&mut engine, 61_000.0);
    let json = serde_json::to_value(engine.snapshot()).unwrap();
    assert_eq!(json["grid_levels"].as_array().unwrap().len(), 8);
    assert_eq!(json["open_positions"][0]["side"], "long");
}
