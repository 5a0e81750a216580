use std::fs;
use std::io::{self, Read};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use nodepin::config::{ConfigError, PinConfig};
use nodepin::consts::{ENV_POLL_INTERVAL_MS, ENV_POSITION_TOLERANCE_PX, ENV_SIZE_TOLERANCE_PX, ENV_ZOOM_SETTLE_TICKS};

mod scenario;

use scenario::StepReport;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("scenario step names unknown node `{0}`")]
    UnknownNode(String),
    #[error("scenario step names unknown overlay `{0}`")]
    UnknownOverlay(String),
    #[error("{0} step(s) reported errors")]
    StepsFailed(usize),
}

#[derive(Parser, Debug)]
#[command(name = "nodepin-cli", about = "Replay overlay pinning scenarios against a simulated canvas")]
struct Cli {
    /// Log verbosity on stderr (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    command: Command,
}

/// Overrides applied on top of `PinConfig::from_env`.
#[derive(Args, Debug)]
struct Tuning {
    /// Divergence poll period in milliseconds.
    #[arg(long, global = true, env = ENV_POLL_INTERVAL_MS)]
    poll_ms: Option<u64>,

    /// Position divergence in pixels before a move counts as a user drag.
    #[arg(long, global = true, env = ENV_POSITION_TOLERANCE_PX)]
    position_tolerance: Option<f64>,

    /// Size divergence in pixels before a resize counts as a user resize.
    #[arg(long, global = true, env = ENV_SIZE_TOLERANCE_PX)]
    size_tolerance: Option<f64>,

    /// Poll ticks skipped after a zoom change.
    #[arg(long, global = true, env = ENV_ZOOM_SETTLE_TICKS)]
    settle_ticks: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scenario file and print one JSON report per step.
    Replay {
        #[arg(default_value = "-", help = "Scenario path, or - for stdin")]
        input: String,

        #[arg(long, help = "Print one pretty JSON array instead of JSON lines")]
        pretty: bool,
    },
    /// Print the built-in sample scenario.
    Sample,
    /// Print the effective tracker config.
    Config,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_config(&cli.tuning)?;
    match cli.command {
        Command::Replay { input, pretty } => run_replay(&input, pretty, config),
        Command::Sample => {
            println!("{}", scenario::SAMPLE);
            Ok(())
        }
        Command::Config => {
            println!(
                "{}",
                serde_json::json!({
                    "poll_interval_ms": config.poll_interval.as_millis(),
                    "position_tolerance_px": config.position_tolerance_px,
                    "size_tolerance_px": config.size_tolerance_px,
                    "zoom_settle_ticks": config.zoom_settle_ticks,
                })
            );
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn resolve_config(tuning: &Tuning) -> Result<PinConfig, CliError> {
    let mut config = PinConfig::from_env()?;
    if let Some(ms) = tuning.poll_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(px) = tuning.position_tolerance {
        config.position_tolerance_px = px;
    }
    if let Some(px) = tuning.size_tolerance {
        config.size_tolerance_px = px;
    }
    if let Some(ticks) = tuning.settle_ticks {
        config.zoom_settle_ticks = ticks;
    }
    config.validate()?;
    Ok(config)
}

fn read_input(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        Ok(raw)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn run_replay(input: &str, pretty: bool, config: PinConfig) -> Result<(), CliError> {
    let scenario = scenario::parse(&read_input(input)?)?;
    let reports = scenario::replay(&scenario, config)?;
    if pretty {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", serde_json::to_string(report)?);
        }
    }
    check_failures(&reports)
}

/// A replay that printed failed steps still exits non-zero.
fn check_failures(reports: &[StepReport]) -> Result<(), CliError> {
    match reports.iter().filter(|r| r.error.is_some()).count() {
        0 => Ok(()),
        failures => Err(CliError::StepsFailed(failures)),
    }
}
