//! Process lifecycle: the signal set and the exit code.
//!
//! SIGQUIT / SIGINT / SIGTERM end the process cleanly (exit 0). SIGUSR1
//! logs a counter snapshot, SIGUSR2 resets dynamic configuration to its
//! boot values. A message on the fault channel ends the process with
//! exit 1.

use anyhow::Result;
use mia_router::{RouterHandle, Stats};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info};

pub async fn run(
    handle: RouterHandle,
    stats: Arc<Stats>,
    mut faults: mpsc::UnboundedReceiver<String>,
) -> Result<i32> {
    let mut quit = signal(SignalKind::quit())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                return Ok(0);
            }
            _ = quit.recv() => {
                info!("SIGQUIT received, shutting down");
                return Ok(0);
            }
            _ = term.recv() => {
                info!("SIGTERM received, shutting down");
                return Ok(0);
            }
            _ = usr1.recv() => {
                stats.snapshot().log();
            }
            _ = usr2.recv() => {
                info!("SIGUSR2 received, restoring configuration defaults");
                handle.apply_config_defaults();
            }
            fault = faults.recv() => {
                match fault {
                    Some(message) => error!(%message, "terminating on fatal fault"),
                    None => error!("fault channel closed unexpectedly"),
                }
                return Ok(1);
            }
        }
    }
}
