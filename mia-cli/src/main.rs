mod lifecycle;
mod logging;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mia_router::{fault_channel, spawn_router, stats::spawn_publisher, Stats};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

const STATS_PERIOD: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "miad", about = "Mission Interface Adapter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the adapter.
    Run {
        /// Path to the TOML configuration file
        #[arg(long, default_value = "mia.toml")]
        config: PathBuf,
    },
    /// Parse the configuration and print the effective values.
    ConfigCheck {
        #[arg(long, default_value = "mia.toml")]
        config: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => {
            logging::init_logging();
            let code = run(&config).await?;
            std::process::exit(code)
        }
        Commands::ConfigCheck { config } => {
            let cfg = settings::load(&config)?;
            println!("{cfg:#?}");
            Ok(())
        }
    }
}

async fn run(config_path: &std::path::Path) -> Result<i32> {
    let cfg = settings::load(config_path)?;
    info!(config = %config_path.display(), "configuration loaded");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (fault_handle, fault_rx) = fault_channel();
    let stats = Stats::new();

    let (handle, addrs) = spawn_router(cfg, stats.clone(), &shutdown_tx, fault_handle)?;
    info!(
        tpn = %addrs.tpn,
        vmw = %addrs.vmw,
        kba = %addrs.kba,
        mission_data = %addrs.mission_data,
        sokf = %addrs.sokf,
        "endpoints bound"
    );
    spawn_publisher(stats.clone(), STATS_PERIOD, shutdown_tx.subscribe());
    handle.start();

    let code = lifecycle::run(handle, stats.clone(), fault_rx).await?;

    // Cancel outstanding I/O; pending queue items are dropped, not flushed.
    let _ = shutdown_tx.send(());
    tokio::time::sleep(Duration::from_millis(50)).await;
    stats.snapshot().log();
    Ok(code)
}
