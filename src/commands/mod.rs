//! Subcommand implementations

pub mod grid;
pub mod live;
pub mod simulate;

use anyhow::{anyhow, Context, Result};
use grid_sim::{Config, GridEngine, GridSide, Snapshot};
use tracing::info;

/// Load the config file (or defaults) and apply the `--side` override
pub fn load_config(config_path: Option<String>, side: Option<String>) -> Result<Config> {
    let mut config = Config::load(config_path.as_deref())?;
    if let Some(path) = &config_path {
        info!("Loaded configuration from: {}", path);
    }

    if let Some(side) = side {
        let side: GridSide = side.parse().map_err(|e: String| anyhow!(e))?;
        info!("Overriding grid side to: {}", side);
        config.grid.side = side;
    }

    Ok(config)
}

pub fn build_engine(config: &Config) -> Result<GridEngine> {
    GridEngine::from_config(config).context("Invalid grid configuration")
}

/// Human-readable account summary followed by the snapshot as JSON
pub fn print_summary(title: &str, engine: &GridEngine, snapshot: &Snapshot, log_lines: usize) -> Result<()> {
    println!("\n{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
    println!("Side:               {}", snapshot.side);
    println!("Position Mode:      {:?}", engine.position_mode());
    println!("Price:              {:.2}", snapshot.price);
    println!("Range:              {:.2} - {:.2}", snapshot.range_min, snapshot.range_max);
    println!("Grid Step:          {:.2}", snapshot.step);
    println!("Open Positions:     {}", snapshot.open_positions.len());
    println!("Fills:              {}", snapshot.fill_count);
    println!("Margin:             ${:.2}", snapshot.margin);
    println!("Realized PnL:       ${:.2}", snapshot.realized_pnl.to_f64());
    println!("Unrealized PnL:     ${:.2}", snapshot.unrealized_pnl);
    println!("Equity:             ${:.2}", snapshot.equity);
    if let Some(tp) = &snapshot.tp_preview {
        println!(
            "Next TP:            {} avg {:.2} -> {:.2} ({:.2} away, {} expected)",
            tp.side.label(),
            tp.avg_entry,
            tp.next_tp,
            tp.distance,
            tp.expected_pnl_at_tp.round_dp(2)
        );
    }
    println!("{}", "=".repeat(60));

    if log_lines > 0 && !engine.log().is_empty() {
        println!("Recent events:");
        for entry in engine.log().recent(log_lines) {
            println!("  {}", entry);
        }
        println!("{}", "=".repeat(60));
    }

    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    println!("{}", json);
    Ok(())
}
