//! Live command implementation
//!
//! Polls the price source on a fixed interval and feeds each quote to the
//! engine until Ctrl+C or `--max-ticks`.

use anyhow::{Context, Result};
use grid_sim::config::{Config, FeedSource};
use grid_sim::feed::{create_feed, PriceSource};
use grid_sim::SharedEngine;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tracing::{debug, error, info, warn};

use super::{build_engine, load_config, print_summary};

type SharedFeed = Arc<Mutex<Box<dyn PriceSource>>>;

pub fn run(
    config_path: Option<String>,
    interval_ms: Option<u64>,
    max_ticks: Option<usize>,
    side: Option<String>,
) -> Result<()> {
    let mut config = load_config(config_path, side)?;
    // Exchange quotes unless the file or environment chose a source
    if config.feed.source.is_none() {
        config.feed.source = Some(FeedSource::Live);
    }
    if let Some(ms) = interval_ms {
        config.feed.poll_interval_ms = ms;
    }

    // The blocking HTTP client must be created and dropped outside the runtime
    let feed: SharedFeed = Arc::new(Mutex::new(create_feed(
        &config.feed,
        config.engine.initial_price,
    )?));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(run_async(config, Arc::clone(&feed), max_ticks));
    drop(runtime);
    result
}

async fn run_async(config: Config, feed: SharedFeed, max_ticks: Option<usize>) -> Result<()> {
    let engine = SharedEngine::new(build_engine(&config)?);

    info!(
        source = ?config.feed.source,
        interval_ms = config.feed.poll_interval_ms,
        side = %config.grid.side,
        "Starting live grid session"
    );

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                error!("Error setting up signal handler: {}", e);
            }
        }
    });

    let quote_timeout = Duration::from_secs(config.feed.timeout_secs.saturating_mul(2).max(1));
    let mut poll = interval(Duration::from_millis(config.feed.poll_interval_ms.max(1)));
    let mut ticks = 0usize;

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let Some((price, source)) = fetch_quote(&feed, quote_timeout).await else {
                    continue;
                };

                // The first quote anchors the series so start-up does not fill
                // the gap from the configured initial price
                if !engine.with(|e| e.is_running()) {
                    engine
                        .with(|e| e.push_tick(price).and_then(|_| e.start()))
                        .context("Failed to start engine")?;
                    info!(price = format!("{:.2}", price), source = %source, "Anchored at first quote");
                    continue;
                }

                match engine.advance(price) {
                    Ok((outcome, snapshot)) => {
                        ticks += 1;
                        if outcome.is_empty() {
                            debug!(price = format!("{:.2}", price), source = %source, "Tick");
                        } else {
                            info!(
                                price = format!("{:.2}", price),
                                source = %source,
                                opened = outcome.opened.len(),
                                closed = outcome.closed.len(),
                                equity = format!("{:.2}", snapshot.equity),
                                "Tick produced fills"
                            );
                        }
                    }
                    Err(e) => warn!("Rejected tick {}: {}", price, e),
                }

                if max_ticks.is_some_and(|max| ticks >= max) {
                    info!("Reached {} ticks", ticks);
                    break;
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    engine.with(|e| -> Result<()> {
        e.stop();
        let snapshot = e.snapshot();
        print_summary("LIVE SESSION RESULTS", e, &snapshot, 20)
    })?;

    info!("Live session ended.");
    Ok(())
}

/// Poll the feed off the async workers. A timeout or missing quote is no tick.
async fn fetch_quote(feed: &SharedFeed, limit: Duration) -> Option<(f64, String)> {
    let feed = Arc::clone(feed);
    let task = tokio::task::spawn_blocking(move || {
        let mut feed = feed.lock().unwrap_or_else(|p| p.into_inner());
        feed.next_price().map(|p| (p, feed.name().to_string()))
    });

    match timeout(limit, task).await {
        Ok(Ok(Some(quote))) => Some(quote),
        Ok(Ok(None)) => {
            warn!("Price feed offline, skipping tick");
            None
        }
        Ok(Err(e)) => {
            error!("Price feed task failed: {}", e);
            None
        }
        Err(_) => {
            warn!("Price feed timed out after {:?}", limit);
            None
        }
    }
}
