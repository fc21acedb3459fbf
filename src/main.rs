use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use takatrack::broadcast::Broadcaster;
use takatrack::config::Config;
use takatrack::scheduler::ScheduleGenerator;
use takatrack::server::Server;
use takatrack::storage::{create_sqlite_store, seed_demo_data};

#[derive(Parser)]
#[command(
    name = "takatrack",
    version,
    about = "Waste-collection backend with live collector tracking and daily schedule generation",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (environment variables are used when omitted)
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
    /// Run the HTTP and WebSocket server with the daily schedule trigger
    Serve {
        /// Override the bind address
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Do not start the daily schedule trigger
        #[arg(long, default_value = "false")]
        no_scheduler: bool,
    },

    /// Create missing collection schedules once and exit
    AssignDays {
        /// Days ahead to schedule (defaults to the configured horizon)
        #[arg(long)]
        horizon: Option<i64>,
    },

    /// Replace all data with the demo collection points and schedules
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    setup_tracing(&config.logging.format, &config.logging.level, cli.verbose)?;

    tracing::info!("takatrack starting");

    match cli.command {
        Commands::Serve { bind, no_scheduler } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            if no_scheduler {
                config.scheduler.enabled = false;
            }
            serve(config).await?;
        }

        Commands::AssignDays { horizon } => {
            let horizon = horizon.unwrap_or(config.scheduler.horizon_days);
            tracing::info!(horizon_days = horizon, "Starting assign-days command");
            assign_days(&config, horizon)?;
        }

        Commands::Seed => {
            tracing::info!("Starting seed command");
            seed(&config)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("takatrack=debug,tower_http=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("takatrack={level},tower_http={level},warn"))
            .context("Invalid log level")?
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

async fn serve(config: Config) -> Result<()> {
    let store = create_sqlite_store(&config.database.sqlite_path)
        .context("Failed to open database")?;
    let server = Server::new(config, store)?;

    println!("{}", server.info().display());

    server
        .start_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

fn assign_days(config: &Config, horizon: i64) -> Result<()> {
    let store = create_sqlite_store(&config.database.sqlite_path)
        .context("Failed to open database")?;
    let generator = ScheduleGenerator::new(store, std::sync::Arc::new(Broadcaster::new()));

    let report = generator.ensure_schedules(horizon)?;

    println!("Collection days assigned");
    println!("  Created: {}", report.created.len());
    println!("  Already scheduled: {}", report.skipped);
    for failure in &report.failures {
        println!("  Failed point {}: {}", failure.point_id, failure.error);
    }

    if !report.is_complete() {
        anyhow::bail!("{} point(s) could not be scheduled", report.failures.len());
    }
    Ok(())
}

fn seed(config: &Config) -> Result<()> {
    let store = create_sqlite_store(&config.database.sqlite_path)
        .context("Failed to open database")?;
    let summary = seed_demo_data(store.as_ref(), chrono::Utc::now())?;

    println!(
        "Seeded {} collection points and {} schedules into {}",
        summary.points,
        summary.schedules,
        config.database.sqlite_path.display()
    );
    Ok(())
}
