// SPDX-License-Identifier: MIT

//! KBA (key-band adapter) endpoint. Uplink reads are opaque pass-through
//! batches; downlink writes carry whole batches forwarded from VMW.

use super::{bind_udp, spawn_writer, wait_for_start};
use crate::config::dest_enabled;
use crate::fault::FaultHandle;
use crate::router::RouterEvent;
use anyhow::Result;
use mia_wire::limits::MAX_IP_PACKET_SIZE;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::info;

pub struct KbaEndpoint {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    enabled: bool,
}

impl KbaEndpoint {
    /// Forwards a whole downlink batch. Disabled destination drops
    /// silently, by design.
    pub fn send_downlink(&self, bytes: Vec<u8>) {
        if !self.enabled {
            return;
        }
        let _ = self.tx.send(bytes);
    }
}

pub fn spawn_kba(
    listen: SocketAddr,
    dest: SocketAddr,
    events: mpsc::UnboundedSender<RouterEvent>,
    mut start: watch::Receiver<bool>,
    shutdown: &broadcast::Sender<()>,
    faults: &FaultHandle,
) -> Result<(KbaEndpoint, SocketAddr)> {
    let socket = Arc::new(bind_udp(listen)?);
    let local_addr = socket.local_addr()?;

    let (tx, queue) = mpsc::unbounded_channel();
    spawn_writer(
        "kba",
        socket.clone(),
        dest,
        queue,
        shutdown.subscribe(),
        faults.clone(),
    );

    let mut shutdown_rx = shutdown.subscribe();
    let reader_faults = faults.clone();
    tokio::spawn(async move {
        if !wait_for_start(&mut start).await {
            return;
        }
        let mut buf = vec![0u8; MAX_IP_PACKET_SIZE];
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(endpoint = "kba", "read loop cancelled");
                    break;
                }
                res = socket.recv_from(&mut buf) => match res {
                    Ok((len, _)) => {
                        if len == 0 {
                            continue;
                        }
                        let _ = events.send(RouterEvent::UplinkPassthrough(buf[..len].to_vec()));
                    }
                    Err(e) => {
                        reader_faults.fatal("kba", e);
                        break;
                    }
                },
            }
        }
    });

    Ok((
        KbaEndpoint {
            tx,
            enabled: dest_enabled(dest),
        },
        local_addr,
    ))
}
