// SPDX-License-Identifier: MIT

//! Fatal-error reporting.
//!
//! A fatal log is a termination request: the message is recorded and the
//! process lifecycle is told to exit with a fault code. It is never an
//! unwinding panic.

use tokio::sync::mpsc;
use tracing::error;

#[derive(Clone)]
pub struct FaultHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl FaultHandle {
    /// Logs at error level and signals the lifecycle to terminate.
    pub fn fatal(&self, subsystem: &str, message: impl std::fmt::Display) {
        error!(subsystem, %message, "fatal fault");
        let _ = self.tx.send(format!("{subsystem}: {message}"));
    }
}

pub fn fault_channel() -> (FaultHandle, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FaultHandle { tx }, rx)
}
