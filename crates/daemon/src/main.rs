use clap::Parser;
use slotlock_daemon::config::{load_config_file, CoordinatorConfig, CoordinatorConfigFile};
use slotlock_daemon::{server, LeaseManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "slotlockd", about = "Lease-based lock coordinator")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = "/etc/slotlock/slotlockd.yaml")]
    config: String,

    /// Address to listen on
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Interval between expiry sweeps, in milliseconds
    #[arg(long)]
    reap_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let file_cfg: CoordinatorConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);
    let config = CoordinatorConfig::resolve(cli.bind, cli.reap_interval_ms, file_cfg)?;

    info!("Starting slotlockd");
    info!("  Bind:           {}", config.bind_addr);
    info!("  Reap interval:  {}ms", config.reap_interval_ms);

    let listener = TcpListener::bind(config.bind_addr).await?;
    let manager = Arc::new(LeaseManager::default());

    server::serve(listener, manager, config.reap_interval(), shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
