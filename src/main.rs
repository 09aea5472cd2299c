//! IP Reputation Watch CLI.

use anyhow::Result;
use clap::Parser;
use ip_reputation_watch::poll_log::PollLog;
use ip_reputation_watch::poller::Providers;
use ip_reputation_watch::{Config, Poller, Scheduler, SnapshotCell, StatusServer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ip-reputation-watch")]
#[command(about = "Watch this host's public IP against fraud-score services and blocklists")]
#[command(version)]
struct Args {
    /// Path to configuration file (environment variables are used if it does not exist)
    #[arg(short, long, default_value = "ip-reputation-watch.yaml")]
    config: PathBuf,

    /// Override the HTTP listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Run a single poll, print the report and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load configuration
    let mut config = if args.config.exists() {
        info!(config = %args.config.display(), "Loading configuration");
        Config::load(&args.config)?
    } else {
        info!(
            config = %args.config.display(),
            "Configuration file not found, using environment"
        );
        Config::from_env()?
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }

    let api_keys = config.api_keys();
    let missing = api_keys.missing();
    if !missing.is_empty() {
        warn!(missing = ?missing, "API keys not configured; poll cycles will be skipped");
    }

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let state = Arc::new(SnapshotCell::new());
    let log = Arc::new(PollLog::open(&config.poll_log)?);
    let providers = Providers::from_config(&config)?;
    let poller = Arc::new(Poller::new(api_keys, providers, state.clone(), log.clone()));

    // Handle --once
    if args.once {
        match poller.poll().await {
            Ok(report) => print!("{}", report),
            Err(e) => {
                println!("{}", e.summary());
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let scheduler = Scheduler::new(poller, config.schedule.interval()).start();

    let server = Arc::new(StatusServer::new(config.server.clone(), state, log));
    info!(address = %server.address(), "Starting IP reputation watch");

    let result = server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await;

    scheduler.stop().await;
    result
}
