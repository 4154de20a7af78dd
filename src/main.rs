//! polyscout - Main Entry Point
//!
//! Scans binary prediction markets for positive-edge opportunities and
//! paper-trades them, once or on an interval.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use polyscout::config::load_config;
use polyscout::runner::build_runner;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "polyscout.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scan/decision/record cycle and exit
    Once,
    /// Run forever, sleeping between cycles
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = load_config(Some(&args.config))?;
    let mut runner = build_runner(config).await?;

    match args.command {
        Command::Once => {
            let report = runner.run_once().await.map_err(|e| {
                error!(error = %e, "cycle aborted");
                e
            })?;
            info!(
                evaluated = report.markets_evaluated,
                opportunities = report.opportunities,
                fills = report.fills,
                "done"
            );
        }
        Command::Run => {
            tokio::select! {
                result = runner.run_forever() => {
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal, exiting");
                }
            }
        }
    }

    Ok(())
}
