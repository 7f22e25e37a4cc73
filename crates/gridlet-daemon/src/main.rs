//! gridlet daemon
//!
//! Main daemon process: wires the resource manager, drives the periodic
//! tick and flush tasks, and serves the REST API.

use clap::Parser;
use gridlet_api::create_router;
use gridlet_core::ManagerConfig;
use gridlet_scheduler::Manager;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// gridletd - GPU rental orchestrator with carbon accounting
#[derive(Parser, Debug)]
#[command(name = "gridletd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the API server
    #[arg(long, default_value = "0.0.0.0")]
    address: String,

    /// Port for the REST API server
    #[arg(long, default_value_t = 9090)]
    port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting gridlet daemon v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => ManagerConfig::from_file(path)?,
        None => ManagerConfig::default(),
    };
    config.api.address = args.address;
    config.api.port = args.port;

    let tick_interval = Duration::from_secs(config.scheduler.tick_interval_secs);
    let flush_interval = Duration::from_secs(config.telemetry.flush_interval_secs);

    let manager = Arc::new(Manager::initialize(config.clone())?);

    // Periodic scheduling pass: complete overrun rentals, promote pending ones.
    {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                interval.tick().await;
                if let Err(e) = manager.tick().await {
                    warn!(error = %e, "Scheduler tick failed");
                }
            }
        });
    }

    // Periodic telemetry flush.
    {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(flush_interval);
            loop {
                interval.tick().await;
                if let Err(e) = manager.flush().await {
                    warn!(error = %e, "Telemetry flush failed");
                }
            }
        });
    }

    let router = create_router(manager);

    let addr: SocketAddr = format!("{}:{}", config.api.address, config.api.port).parse()?;
    info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
