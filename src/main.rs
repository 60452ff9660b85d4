//! guardsync command line.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ config ──▶ Orchestrator::run_once
//!                                   │
//!            origin ◀── remote ◀────┤ fetch origin snapshot (once)
//!                                   │
//!                                   ├──▶ replica worker ──▶ snapshot ──▶ reconcile ──▶ remote ──▶ replica
//!                                   ├──▶ replica worker ──▶ ...
//!                                   ▼
//!                               RunReport ──▶ stdout / exit status
//!
//!   Cross-cutting: observability (tracing, metrics), lifecycle (signals)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use guardsync::config::{load_config, ConfigError};
use guardsync::lifecycle::{spawn_signal_handler, Shutdown};
use guardsync::observability::{init_logging, init_metrics};
use guardsync::reconcile::ToggleOutcome;
use guardsync::remote::HttpConnector;
use guardsync::{Orchestrator, RunReport};

const EXIT_REPLICA_FAILURE: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "guardsync")]
#[command(about = "Synchronize filtering appliance configuration from an origin to replicas", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "guardsync.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every replica with the origin
    Run {
        /// Compute and report changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Repeat the run every N seconds until interrupted
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Report format printed after each run
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        report: ReportFormat,
    },
    /// Validate the configuration file and exit
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            report_config_error(&cli.config, &e);
            return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
        }
    };

    let (dry_run, interval_secs, report_format) = match cli.command {
        Commands::CheckConfig => {
            println!(
                "{}: ok (origin {}, {} replica(s))",
                cli.config.display(),
                config.origin.url,
                config.replicas.len()
            );
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Run {
            dry_run,
            interval_secs,
            report,
        } => (dry_run, interval_secs, report),
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "guardsync starting");

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(metrics_address = %address, error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(metrics_address = %address, "Failed to parse metrics address"),
        }
    }

    config.run.dry_run |= dry_run;
    let connector = Arc::new(HttpConnector::new(Duration::from_secs(config.run.request_timeout_secs)));
    let orchestrator = Orchestrator::new(config, connector);

    let Some(interval_secs) = interval_secs else {
        let report = orchestrator.run_once().await;
        print_report(&report, report_format)?;
        return Ok(exit_code(&report));
    };

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = orchestrator.run_once().await;
                print_report(&report, report_format)?;
                last = Some(exit_code(&report));
            }
            _ = stop.recv() => break,
        }
    }

    tracing::info!("Shutdown complete");
    Ok(last.unwrap_or(ExitCode::SUCCESS))
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REPLICA_FAILURE)
    }
}

fn report_config_error(path: &std::path::Path, error: &ConfigError) {
    eprintln!("Error: invalid configuration {}", path.display());
    match error {
        ConfigError::Validation(errors) => {
            for e in errors {
                eprintln!("  - {}", e);
            }
        }
        other => eprintln!("  {}", other),
    }
}

fn print_report(report: &RunReport, format: ReportFormat) -> Result<(), serde_json::Error> {
    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        ReportFormat::Text => {
            let mode = if report.dry_run { " (dry run)" } else { "" };
            println!("run {}{}: {} ms", report.run_id, mode, report.duration_ms);
            if let Some(error) = &report.origin_error {
                println!("  origin: {}", error);
            }
            for replica in &report.replicas {
                println!("  {} [{}]", replica.host, replica.status.as_str());
                if let Some(error) = &replica.fatal_error {
                    println!("    error: {}", error);
                }
                for (kind, entity) in &replica.entities {
                    println!(
                        "    {:<20} +{} ~{} -{} ={} !{}",
                        kind.as_str(),
                        entity.added,
                        entity.updated,
                        entity.deleted,
                        entity.unchanged,
                        entity.failed
                    );
                    if entity.has_failures() {
                        for failure in &entity.errors {
                            println!("      {} {}: {}", failure.op.as_str(), failure.key, failure.message);
                        }
                    }
                }
                for toggle in &replica.toggles {
                    match &toggle.outcome {
                        ToggleOutcome::Unchanged => {}
                        outcome => println!("    {:<20} {}", toggle.toggle.as_str(), outcome.as_str()),
                    }
                }
            }
        }
    }
    Ok(())
}
