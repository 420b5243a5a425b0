// SPDX-License-Identifier: MIT

//! UDP endpoint plumbing shared by the five peers.
//!
//! Every endpoint binds its socket at construction. Reads run in a spawned
//! task gated on the router's start signal; writes run in a second task
//! that drains a queue one datagram at a time, so at most one send is in
//! flight per endpoint.

pub mod kba;
pub mod md;
pub mod sokf;
pub mod tpn;
pub mod vmw;

use crate::fault::FaultHandle;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::info;

pub(crate) fn bind_udp(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("binding UDP socket at {addr}"))?;
    Ok(UdpSocket::from_std(socket.into())?)
}

/// Blocks until the router posts its start task. Returns false if the
/// router went away before starting.
pub(crate) async fn wait_for_start(start: &mut watch::Receiver<bool>) -> bool {
    while !*start.borrow() {
        if start.changed().await.is_err() {
            return false;
        }
    }
    true
}

/// Write loop toward one fixed destination. The channel is the write
/// queue; popping one item per send keeps sends strictly serialized.
pub(crate) fn spawn_writer(
    name: &'static str,
    socket: Arc<UdpSocket>,
    dest: SocketAddr,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
    mut shutdown: broadcast::Receiver<()>,
    faults: FaultHandle,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(endpoint = name, "write loop cancelled");
                    break;
                }
                item = queue.recv() => {
                    let Some(bytes) = item else { break };
                    if let Err(e) = socket.send_to(&bytes, dest).await {
                        faults.fatal(name, e);
                        break;
                    }
                }
            }
        }
    });
}
