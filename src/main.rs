mod config;
mod monitor;
mod process;
mod serve;
mod stats;
mod status;

use crate::config::WatchConfig;
use crate::monitor::Monitor;
use crate::process::{MinerControl, TaskController};
use crate::stats::StatsClient;
use crate::status::StatusStore;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Watchdog for NiceHash Miner 2: polls the pool-reported balance for a
/// wallet and kills/restarts the miner when the balance stops advancing.
/// Serves status and manual start/stop controls over HTTP.
#[derive(Parser, Debug)]
#[command(name = "nhwatch", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "nhwatch.toml")]
    config: PathBuf,

    /// File holding the payout wallet address
    #[arg(short, long, default_value = "wallet")]
    wallet_file: PathBuf,

    /// Poll interval in seconds (overrides config)
    #[arg(long)]
    interval: Option<u64>,

    /// Control surface port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-tick decisions, process probes)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    tracing::info!("nhwatch starting");

    let mut config = match WatchConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "cannot load config");
            return ExitCode::FAILURE;
        }
    };
    if let Some(secs) = cli.interval {
        config.monitor.poll_interval_secs = secs;
    }
    if let Some(port) = cli.port {
        config.serve.port = port;
    }

    let wallet = match config::load_wallet(&cli.wallet_file) {
        Ok(wallet) => wallet,
        Err(e) => {
            tracing::error!(error = %e, "cannot load wallet address, closing");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(wallet = %wallet, "loaded wallet address");

    if cli.dry_run {
        println!("nhwatch v{}", env!("CARGO_PKG_VERSION"));
        println!("Wallet:        {wallet}");
        println!("Poll interval: {}s", config.monitor.poll_interval_secs);
        println!("Pool API:      {}", config.pool.api_base);
        println!("Miner images:  {} + {}", config.miner.ui_image, config.miner.worker_image);
        println!("Listening on:  {}:{}", config.serve.bind, config.serve.port);
        return ExitCode::SUCCESS;
    }

    let control: Arc<dyn MinerControl> = Arc::new(TaskController::new(&config.miner));

    // The miner must be up before monitoring begins; a dead process here
    // would read as a bootstrap on the first tick and never get restarted.
    match control.is_running().await {
        Err(e) => {
            tracing::error!(error = %e, "cannot check miner process, closing");
            return ExitCode::FAILURE;
        }
        Ok(false) => {
            if let Err(e) = control.start().await {
                tracing::error!(error = %e, "cannot start miner, closing");
                return ExitCode::FAILURE;
            }
        }
        Ok(true) => {}
    }

    let stats = match StatsClient::new(&config.pool) {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!(error = %e, "cannot build stats client, closing");
            return ExitCode::FAILURE;
        }
    };

    let poll_interval = Duration::from_secs(config.monitor.poll_interval_secs);
    let store = StatusStore::new(poll_interval);
    let monitor = Monitor::new(
        wallet,
        stats,
        control.clone(),
        store.clone(),
        poll_interval,
    );
    tokio::spawn(monitor.run());

    if let Err(e) = serve::run(&config.serve, store, control).await {
        tracing::error!(error = %e, "control surface failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
