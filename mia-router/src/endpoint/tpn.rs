// SPDX-License-Identifier: MIT

//! TPN (radio frontend) endpoint.
//!
//! The peer owns the real UDP↔MPLS decapsulation; this side classifies
//! each received datagram as a fixed ITM or a pre-wrapped MPLS packet and
//! hands it to the router whole. TPN has no configured destination: sends
//! target the remote address of the most recent uplink datagram.

use super::{bind_udp, wait_for_start};
use crate::fault::FaultHandle;
use crate::kframe::KFrameClock;
use crate::router::RouterEvent;
use anyhow::Result;
use mia_wire::ite::IteHeader;
use mia_wire::itm::ItmHeader;
use mia_wire::limits::{
    FIXED_ITM_PAYLOAD_SIZE, ITM_HEADER_SIZE, MAX_IP_PACKET_SIZE, MIN_MPLS_PACKET_SIZE,
    MPLS_HEADER_SIZE,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, trace, warn};

const FIXED_ITM_SIZE: usize = ITM_HEADER_SIZE + FIXED_ITM_PAYLOAD_SIZE;

pub struct TpnEndpoint {
    tx: mpsc::UnboundedSender<(SocketAddr, Vec<u8>)>,
    socket: Arc<UdpSocket>,
    clock: KFrameClock,
    peer: Option<SocketAddr>,
}

impl TpnEndpoint {
    pub fn set_peer(&mut self, addr: SocketAddr) {
        if self.peer != Some(addr) {
            info!(endpoint = "tpn", %addr, "learned peer address");
            self.peer = Some(addr);
        }
    }

    /// Sends a downlink MPLS packet intact. Dropped silently until a peer
    /// address has been learned.
    pub fn send_downlink(&self, bytes: Vec<u8>) {
        let Some(peer) = self.peer else {
            trace!(endpoint = "tpn", "no peer learned yet, dropping downlink");
            return;
        };
        let _ = self.tx.send((peer, bytes));
    }

    pub fn on_sokf(&mut self) {
        let frame = self.clock.advance();
        trace!(endpoint = "tpn", frame, "k-frame tick");
    }

    /// Toggles UDP checksum generation on the socket. Linux-only socket
    /// option; elsewhere the request is logged and ignored.
    pub fn apply_udp_checksum(&self, enabled: bool) {
        #[cfg(target_os = "linux")]
        {
            use std::os::fd::AsRawFd;
            let no_check: libc::c_int = i32::from(!enabled);
            // SAFETY: fd is owned by the socket for the duration of the call
            // and the option value is a plain int.
            let rc = unsafe {
                libc::setsockopt(
                    self.socket.as_raw_fd(),
                    libc::SOL_SOCKET,
                    libc::SO_NO_CHECK,
                    &no_check as *const libc::c_int as *const libc::c_void,
                    std::mem::size_of::<libc::c_int>() as libc::socklen_t,
                )
            };
            if rc != 0 {
                warn!(
                    endpoint = "tpn",
                    error = %std::io::Error::last_os_error(),
                    "failed to toggle UDP checksum"
                );
            } else {
                info!(endpoint = "tpn", enabled, "UDP checksum toggled");
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            warn!(endpoint = "tpn", enabled, "UDP checksum toggle unsupported on this platform");
        }
    }
}

pub fn spawn_tpn(
    listen: SocketAddr,
    events: mpsc::UnboundedSender<RouterEvent>,
    mut start: watch::Receiver<bool>,
    shutdown: &broadcast::Sender<()>,
    faults: &FaultHandle,
) -> Result<(TpnEndpoint, SocketAddr)> {
    let socket = Arc::new(bind_udp(listen)?);
    let local_addr = socket.local_addr()?;

    let (tx, mut queue) = mpsc::unbounded_channel::<(SocketAddr, Vec<u8>)>();
    let writer_socket = socket.clone();
    let mut writer_shutdown = shutdown.subscribe();
    let writer_faults = faults.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_shutdown.recv() => {
                    info!(endpoint = "tpn", "write loop cancelled");
                    break;
                }
                item = queue.recv() => {
                    let Some((dest, bytes)) = item else { break };
                    if let Err(e) = writer_socket.send_to(&bytes, dest).await {
                        writer_faults.fatal("tpn", e);
                        break;
                    }
                }
            }
        }
    });

    let reader_socket = socket.clone();
    let mut shutdown_rx = shutdown.subscribe();
    let reader_faults = faults.clone();
    tokio::spawn(async move {
        if !wait_for_start(&mut start).await {
            return;
        }
        let mut buf = vec![0u8; MAX_IP_PACKET_SIZE];
        let mut last_peer: Option<SocketAddr> = None;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(endpoint = "tpn", "read loop cancelled");
                    break;
                }
                res = reader_socket.recv_from(&mut buf) => match res {
                    Ok((len, from)) => {
                        if last_peer != Some(from) {
                            last_peer = Some(from);
                            let _ = events.send(RouterEvent::TpnPeer(from));
                        }
                        handle_read(&buf[..len], &events);
                    }
                    Err(e) => {
                        reader_faults.fatal("tpn", e);
                        break;
                    }
                },
            }
        }
    });

    Ok((
        TpnEndpoint {
            tx,
            socket,
            clock: KFrameClock::new(),
            peer: None,
        },
        local_addr,
    ))
}

fn handle_read(datagram: &[u8], events: &mpsc::UnboundedSender<RouterEvent>) {
    // A bare fixed ITM is routed as-is; everything else is expected to be
    // a pre-wrapped MPLS packet (fixed or VITM).
    if datagram.len() == FIXED_ITM_SIZE {
        if let Ok(hdr) = ItmHeader::parse(datagram) {
            if !hdr.is_vitm() {
                let _ = events.send(RouterEvent::UplinkItm {
                    itm: datagram.to_vec(),
                    src: hdr.src_node(),
                    dst: hdr.dst_node(),
                });
                return;
            }
        }
    }

    if datagram.len() < MIN_MPLS_PACKET_SIZE {
        warn!(endpoint = "tpn", len = datagram.len(), "datagram too short for MPLS packet");
        return;
    }
    let itm = match ItmHeader::parse(&datagram[MPLS_HEADER_SIZE..]) {
        Ok(hdr) => hdr,
        Err(e) => {
            warn!(endpoint = "tpn", %e, "malformed embedded ITM header");
            return;
        }
    };
    let dst = itm.dst_node();
    // VITM payloads open with the ITE common header, which carries the
    // real source node; fixed ITMs carry it in the alternate header layout.
    let src = if itm.is_vitm() {
        match IteHeader::parse(&datagram[MPLS_HEADER_SIZE + ITM_HEADER_SIZE..]) {
            Ok(ite) => ite.src_node(),
            Err(_) => {
                warn!(endpoint = "tpn", "VITM too short for ITE header");
                return;
            }
        }
    } else {
        itm.src_node()
    };
    let _ = events.send(RouterEvent::UplinkMpls {
        packet: datagram.to_vec(),
        src,
        dst,
    });
}
