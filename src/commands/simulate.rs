//! Simulate command implementation

use anyhow::{anyhow, Context, Result};
use grid_sim::config::PositionMode;
use grid_sim::feed::create_feed;
use tracing::{debug, info};

use super::{build_engine, load_config, print_summary};

pub fn run(
    config_path: Option<String>,
    ticks: usize,
    seed: Option<u64>,
    side: Option<String>,
    mode: Option<String>,
    log_lines: usize,
) -> Result<()> {
    info!("Starting simulation");

    let mut config = load_config(config_path, side)?;

    if let Some(mode) = mode {
        let mode: PositionMode = mode.parse().map_err(|e: String| anyhow!(e))?;
        info!("Overriding position mode to: {:?}", mode);
        config.engine.position_mode = mode;
    }
    if seed.is_some() {
        config.feed.seed = seed;
    }

    let mut engine = build_engine(&config)?;
    let mut feed = create_feed(&config.feed, config.engine.initial_price)?;

    engine.start().context("Failed to start engine")?;
    info!(ticks, seed = ?config.feed.seed, source = feed.name(), "Running simulation");

    for i in 0..ticks {
        let Some(outcome) = engine.poll(feed.as_mut())? else {
            continue;
        };
        if !outcome.is_empty() {
            debug!(
                tick = i,
                price = format!("{:.2}", engine.price()),
                opened = outcome.opened.len(),
                closed = outcome.closed.len(),
                "Tick produced fills"
            );
        }
    }

    engine.stop();
    let snapshot = engine.snapshot();
    print_summary("SIMULATION RESULTS", &engine, &snapshot, log_lines)?;

    info!("Simulation completed successfully");
    Ok(())
}
