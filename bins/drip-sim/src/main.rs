//! Drip ledger simulator.
//!
//! Replays JSON scenarios against an in-memory hub and prints the resulting
//! balances, or answers one-off questions such as when a set of streams
//! would run dry.

mod config;
mod scenario;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use drip_core::types::StreamReceiver;
use drip_streams::{StreamsEngine, calc_max_end};
use tracing::info;

use crate::config::SimConfig;
use crate::scenario::{Scenario, Simulation};

#[derive(Parser, Debug)]
#[command(name = "drip-sim", version, about = "Scenario simulator for the Drip ledger")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Config file (TOML, JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Cycle length in seconds
    #[arg(long, global = true)]
    cycle_secs: Option<u32>,
}

impl GlobalArgs {
    /// Layer the flags over the file and environment configuration.
    fn into_config(self) -> Result<SimConfig> {
        let mut cfg = SimConfig::load(self.config.as_deref())?;
        if let Some(level) = self.log_level {
            cfg.log_level = level;
        }
        if let Some(format) = self.log_format {
            cfg.log_format = format;
        }
        if let Some(cycle_secs) = self.cycle_secs {
            cfg.hub.cycle_secs = cycle_secs;
        }
        cfg.hub.validate()?;
        Ok(cfg)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario file and print the final report as JSON
    Run {
        /// Path to the scenario JSON
        scenario: PathBuf,

        /// Include the event log in the report
        #[arg(long)]
        events: bool,
    },
    /// Compute when a balance streamed to a receiver list runs out
    MaxEnd {
        /// Balance in token units
        #[arg(long)]
        balance: u128,

        /// Timestamp the balance is set at
        #[arg(long)]
        now: u32,

        /// Receivers as a JSON array of `{account_id, config}` objects
        #[arg(long)]
        receivers: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.global.into_config()?;
    init_logging(&cfg.log_level, &cfg.log_format);
    info!(
        cycle_secs = cfg.hub.cycle_secs,
        "drip-sim v{}",
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Command::Run { scenario, events } => run_scenario(&cfg, &scenario, events),
        Command::MaxEnd {
            balance,
            now,
            receivers,
        } => max_end(&cfg, balance, now, &receivers),
    }
}

fn run_scenario(cfg: &SimConfig, path: &Path, events: bool) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let scenario = Scenario::from_json(&json)?;
    let mut sim = Simulation::new(&scenario, cfg.hub)?;
    sim.run(&scenario.steps)?;

    let mut report = sim.report()?;
    info!(
        steps = scenario.steps.len(),
        events = report.events.len(),
        "scenario finished"
    );
    if !events {
        report.events.clear();
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn max_end(cfg: &SimConfig, balance: u128, now: u32, receivers: &str) -> Result<()> {
    let mut list: Vec<StreamReceiver> =
        serde_json::from_str(receivers).context("parsing receivers")?;
    list.sort();
    let math = cfg.hub.validate()?;
    StreamsEngine::new(math).validate_receivers(&list)?;
    let max_end = calc_max_end(&math, balance, &list, now)?;
    println!("{max_end}");
    Ok(())
}

/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
