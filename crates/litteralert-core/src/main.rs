//! litteralert CLI
//!
//! Cron entry points for the litter box alerting jobs.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use litteralert::alerting::TextbeltClient;
use litteralert::config::LoggingConfig;
use litteralert::history::{HistoryStore, LockMode};
use litteralert::{device, jobs, Config};

/// litteralert - SMS alerts for a self-cleaning litter box
#[derive(Parser)]
#[command(name = "litteralert")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "LITTERALERT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the robot, send due alerts and the morning digest
    Check,

    /// Prune the history log and check the SMS balance
    Cleanup {
        /// Wait for a running cleanup instead of exiting
        #[arg(long)]
        wait: bool,
    },

    /// Print the history log
    History {
        /// Only entries from the last N hours
        #[arg(long)]
        hours: Option<u32>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_logging(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Check => run_check(&config, cli.format).await,
        Commands::Cleanup { wait } => run_cleanup(&config, wait, cli.format).await,
        Commands::History { hours } => run_history(&config, hours, cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_check(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    config.validate_sms()?;

    let store = HistoryStore::new(&config.history.path);
    let device = device::from_config(&config.device)?;
    let gateway = TextbeltClient::new(&config.sms)?;
    let now = Utc::now();

    info!(test_mode = config.test, "Starting check");
    let outcome = jobs::run_check(config, &store, device.as_ref(), &gateway, &now).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => {
            for decision in &outcome.decisions {
                let status = match (decision.entry.sent, decision.suppressed_reason) {
                    (true, _) => "sent".to_string(),
                    (false, Some(reason)) => format!("suppressed ({reason})"),
                    (false, None) => "no alert".to_string(),
                };
                println!(
                    "{:<9} {:>5.1}%  {:<8} {status}",
                    decision.entry.kind, decision.entry.level, decision.tier
                );
            }
            if outcome.digest.is_some() {
                println!("morning digest sent");
            }
        }
    }

    Ok(())
}

async fn run_cleanup(config: &Config, wait: bool, format: OutputFormat) -> anyhow::Result<()> {
    config.validate_sms()?;

    let store = HistoryStore::new(&config.history.path);
    let gateway = TextbeltClient::new(&config.sms)?;
    let mode = if wait {
        LockMode::Blocking
    } else {
        LockMode::FailFast
    };

    let outcome = jobs::run_cleanup(config, &store, &gateway, &Utc::now(), mode).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => {
            match outcome.prune {
                Some(report) => println!(
                    "Log cleanup: removed {} old entries, kept {}.",
                    report.removed, report.kept
                ),
                None => println!("Log cleanup skipped: another cleanup is running."),
            }
            if let Some(remaining) = outcome.quota_remaining {
                println!("SMS quota remaining: {remaining}");
            }
        }
    }

    Ok(())
}

fn run_history(config: &Config, hours: Option<u32>, format: OutputFormat) -> anyhow::Result<()> {
    let store = HistoryStore::new(&config.history.path);
    let entries = match hours {
        Some(hours) => store.read_since(&(Utc::now() - Duration::hours(i64::from(hours))))?,
        None => store.read_all()?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                println!(
                    "{}  {:<9} {:>5.1}  {}",
                    entry.timestamp_field(),
                    entry.kind,
                    entry.level,
                    entry.sent_field()
                );
            }
            println!("{} entries", entries.len());
        }
    }

    Ok(())
}
