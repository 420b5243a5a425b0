// SPDX-License-Identifier: MIT

//! Monotonic counters published by the adapter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Default)]
pub struct Stats {
    pub mpls_packets_converted: AtomicU64,
    pub invalid_mpls_packets_discarded: AtomicU64,
    pub sokf_missed: AtomicU64,
}

impl Stats {
    pub fn new() -> Arc<Stats> {
        Arc::new(Stats::default())
    }

    pub fn increment_converted(&self) {
        self.mpls_packets_converted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_invalid(&self) {
        self.invalid_mpls_packets_discarded
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_sokf_missed(&self, delta: u64) {
        self.sokf_missed.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            mpls_packets_converted: self.mpls_packets_converted.load(Ordering::Relaxed),
            invalid_mpls_packets_discarded: self
                .invalid_mpls_packets_discarded
                .load(Ordering::Relaxed),
            sokf_missed: self.sokf_missed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub mpls_packets_converted: u64,
    pub invalid_mpls_packets_discarded: u64,
    pub sokf_missed: u64,
}

impl StatsSnapshot {
    pub fn log(&self) {
        info!(
            converted = self.mpls_packets_converted,
            invalid_discarded = self.invalid_mpls_packets_discarded,
            sokf_missed = self.sokf_missed,
            "adapter counters"
        );
    }
}

/// Periodic counter publisher. Runs until shutdown.
pub fn spawn_publisher(
    stats: Arc<Stats>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => stats.snapshot().log(),
            }
        }
    });
}
