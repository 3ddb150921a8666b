use std::path::PathBuf;
use std::process::ExitCode;

use algo_trade_core::ConfigLoader;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;

mod broker;
mod commands;
mod runtime;

use runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "algo-trade")]
#[command(about = "Broker health and capital risk governance for the trading engine", long_about = None)]
struct Cli {
    /// Config file path; defaults to config/Config.toml plus APP_ overrides.
    #[arg(short, long, global = true, env = "ALGO_TRADE_CONFIG")]
    config: Option<PathBuf>,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe the broker and show circuit breaker state
    Health(commands::HealthArgs),
    /// Decide whether new positions may be opened today (exit code 2 when not)
    Gate(commands::GateArgs),
    /// Read equity from the broker and record it in the capital scaler
    SyncEquity(commands::SyncEquityArgs),
    /// Book the day's P/L and apply the scaling policy
    CloseDay(commands::CloseDayArgs),
    /// Show progress towards the next capital level
    Progress(commands::ProgressArgs),
    /// Submit an order through the retry wrapper
    Submit(commands::SubmitArgs),
    /// Inspect or replay the failed order queue
    Queue(commands::QueueArgs),
    /// Show recent alerts
    Alerts(commands::AlertsArgs),
    /// Restart the capital scaler at level 0
    ResetScaler(commands::ResetScalerArgs),
    /// Clear a drawdown halt after manual review
    Resume(commands::ResumeArgs),
    /// Close the circuit breaker after manual review
    ResetBreaker(commands::ResetBreakerArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(cli.log_file.as_ref())?;

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigLoader::load().context("Failed to load config")?,
    };
    let rt = Runtime::open(config)?;

    let outcome = dispatch(&rt, cli.command).await;

    if let Err(e) = rt.flush().await {
        error!(error = %e, "Failed to persist state on exit");
    }
    outcome
}

async fn dispatch(rt: &Runtime, command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Health(args) => commands::run_health(rt, args).await?,
        Commands::Gate(args) => {
            if !commands::run_gate(rt, args).await? {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::SyncEquity(args) => commands::run_sync_equity(rt, args).await?,
        Commands::CloseDay(args) => commands::run_close_day(rt, args).await?,
        Commands::Progress(args) => commands::run_progress(rt, args).await?,
        Commands::Submit(args) => commands::run_submit(rt, args).await?,
        Commands::Queue(args) => commands::run_queue(rt, args).await?,
        Commands::Alerts(args) => commands::run_alerts(rt, args).await?,
        Commands::ResetScaler(args) => commands::run_reset_scaler(rt, args).await?,
        Commands::Resume(args) => commands::run_resume(rt, args).await?,
        Commands::ResetBreaker(args) => commands::run_reset_breaker(rt, args).await?,
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            // stdout carries command output
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
