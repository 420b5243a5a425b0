// SPDX-License-Identifier: MIT

//! SOKF timing listener.
//!
//! Receives the 12-byte start-of-K-frame datagram, detects missed frames
//! by offset arithmetic, and notifies the router once per valid signal.
//! Field violations are fatal; wrong-size datagrams are merely ignored.

use super::{bind_udp, wait_for_start};
use crate::fault::FaultHandle;
use crate::router::RouterEvent;
use crate::stats::Stats;
use anyhow::Result;
use mia_wire::limits::{MAX_IP_PACKET_SIZE, NUM_KFRAME_OFFSETS, SOKF_MSG_LEN};
use mia_wire::sokf::SokfMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

enum SyncState {
    Synchronizing,
    Synchronized { prev_offset: u32 },
}

pub fn spawn_sokf(
    listen: SocketAddr,
    events: mpsc::UnboundedSender<RouterEvent>,
    mut start: watch::Receiver<bool>,
    shutdown: &broadcast::Sender<()>,
    faults: &FaultHandle,
    stats: Arc<Stats>,
) -> Result<SocketAddr> {
    let socket = bind_udp(listen)?;
    let local_addr = socket.local_addr()?;

    let mut shutdown_rx = shutdown.subscribe();
    let faults = faults.clone();
    tokio::spawn(async move {
        if !wait_for_start(&mut start).await {
            return;
        }
        let mut buf = vec![0u8; MAX_IP_PACKET_SIZE];
        let mut state = SyncState::Synchronizing;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(endpoint = "sokf", "read loop cancelled");
                    break;
                }
                res = socket.recv_from(&mut buf) => match res {
                    Ok((len, _)) => {
                        if len != SOKF_MSG_LEN as usize {
                            warn!(endpoint = "sokf", len, "ignoring datagram of unexpected size");
                            continue;
                        }
                        let msg = match SokfMessage::decode(&buf[..len]) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!(endpoint = "sokf", %e, "undecodable SOKF datagram");
                                continue;
                            }
                        };
                        if let Err(e) = msg.check() {
                            // Field violations mean the timing source is
                            // broken; the socket closes with the task.
                            faults.fatal("sokf", e);
                            break;
                        }
                        state = advance(state, msg.kframe_offset, &stats);
                        let _ = events.send(RouterEvent::Sokf);
                    }
                    Err(e) => {
                        faults.fatal("sokf", e);
                        break;
                    }
                },
            }
        }
    });

    Ok(local_addr)
}

fn advance(state: SyncState, offset: u32, stats: &Stats) -> SyncState {
    match state {
        SyncState::Synchronizing => {
            debug!(endpoint = "sokf", offset, "synchronized to timing source");
        }
        SyncState::Synchronized { prev_offset } => {
            let elapsed = if offset > prev_offset {
                offset - prev_offset
            } else {
                (NUM_KFRAME_OFFSETS - prev_offset) + offset
            };
            if elapsed > 1 {
                warn!(endpoint = "sokf", missed = elapsed - 1, "missed SOKF frames");
                stats.add_sokf_missed(u64::from(elapsed - 1));
            }
        }
    }
    SyncState::Synchronized {
        prev_offset: offset,
    }
}
