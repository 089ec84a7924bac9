//! Grid trading simulator - main entry point
//!
//! This binary provides three subcommands:
//! - grid: Print the level ladder and long/short split for a configuration
//! - simulate: Drive the engine from the configured feed (seeded random walk by default)
//! - live: Drive the engine with polled BTC/USD spot quotes

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "grid-sim")]
#[command(about = "Grid trading bot simulator with simulated or live price feeds", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show grid levels for a configuration
    Grid {
        /// Path to configuration file (defaults when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Grid side: long, short or neutral (overrides config file)
        #[arg(long)]
        side: Option<String>,

        /// Price used for the long/short split
        #[arg(long)]
        price: Option<f64>,
    },

    /// Run the engine against the configured feed, a simulated random walk unless set
    Simulate {
        /// Path to configuration file (defaults when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "500")]
        ticks: usize,

        /// Random seed for a reproducible walk
        #[arg(long)]
        seed: Option<u64>,

        /// Grid side: long, short or neutral (overrides config file)
        #[arg(long)]
        side: Option<String>,

        /// Position mode: per_level or averaged (overrides config file)
        #[arg(long)]
        mode: Option<String>,

        /// Number of event log lines to print
        #[arg(long, default_value = "20")]
        log_lines: usize,
    },

    /// Run the engine against polled spot quotes until Ctrl+C
    Live {
        /// Path to configuration file (defaults when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Poll interval in milliseconds (overrides config file)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many ticks
        #[arg(long)]
        max_ticks: Option<usize>,

        /// Grid side: long, short or neutral (overrides config file)
        #[arg(long)]
        side: Option<String>,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Grid { .. } => "grid",
        Commands::Simulate { .. } => "simulate",
        Commands::Live { .. } => "live",
    };

    dotenv::dotenv().ok();
    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Grid {
            config,
            side,
            price,
        } => commands::grid::run(config, side, price),

        Commands::Simulate {
            config,
            ticks,
            seed,
            side,
            mode,
            log_lines,
        } => commands::simulate::run(config, ticks, seed, side, mode, log_lines),

        Commands::Live {
            config,
            interval,
            max_ticks,
            side,
        } => commands::live::run(config, interval, max_ticks, side),
    }
}
