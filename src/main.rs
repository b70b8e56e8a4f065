use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prospector::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "Campaign-driven lead discovery crawler",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (defaults to PROSPECTOR_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scheduler tick and exit (for cron)
    Run,

    /// Tick periodically and expose /metrics and /health
    Serve {
        /// Override scheduler.interval_secs
        #[arg(short, long)]
        interval: Option<u64>,

        /// Disable the metrics endpoint
        #[arg(long, default_value = "false")]
        no_metrics: bool,
    },

    /// Create the PostgreSQL tables
    InitSchema,

    /// List campaigns eligible for the next tick
    Campaigns {
        /// Maximum number of campaigns to list
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("prospector starting");

    match cli.command {
        Commands::Run => {
            tracing::info!(batch_size = config.scheduler.batch_size, "Starting run command");
            commands::run(config).await?;
        }

        Commands::Serve {
            interval,
            no_metrics,
        } => {
            if let Some(interval) = interval {
                config.scheduler.interval_secs = interval;
            }
            if no_metrics {
                config.metrics.enabled = false;
            }
            tracing::info!(
                interval_secs = config.scheduler.interval_secs,
                metrics = config.metrics.enabled,
                "Starting serve command"
            );
            commands::serve(config).await?;
        }

        Commands::InitSchema => {
            tracing::info!("Starting init-schema command");
            commands::init_schema(config).await?;
        }

        Commands::Campaigns { limit } => {
            tracing::info!(limit, "Starting campaigns command");
            commands::campaigns(config, limit).await?;
        }
    }

    tracing::info!("prospector finished");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("prospector=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("prospector={level},warn"))?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
