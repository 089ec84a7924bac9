//! Grid command implementation

use anyhow::{Context, Result};
use grid_sim::Grid;
use tracing::info;

use super::load_config;

pub fn run(config_path: Option<String>, side: Option<String>, price: Option<f64>) -> Result<()> {
    let config = load_config(config_path, side)?;
    let grid = Grid::build(&config.grid).context("Invalid grid configuration")?;
    let price = price.unwrap_or(config.engine.initial_price);

    info!(levels = grid.len(), step = grid.step(), "Grid built");

    let partition = grid.partition(price);
    println!("\n{}", "=".repeat(60));
    println!("GRID LEVELS ({} side, price {:.2})", config.grid.side, price);
    println!("{}", "=".repeat(60));
    for &level in grid.levels().iter().rev() {
        let role = if partition.long.contains(&level) {
            "LONG entry"
        } else if partition.short.contains(&level) {
            "SHORT entry"
        } else {
            "inactive"
        };
        let marker = if (level - price).abs() < grid.step() / 2.0 { " <" } else { "" };
        println!("{:>12.2}  {}{}", level, role, marker);
    }
    println!("{}", "=".repeat(60));
    println!("Step: {:.2}  Midpoint: {:.2}", grid.step(), grid.midpoint());

    Ok(())
}
