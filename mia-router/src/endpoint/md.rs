// SPDX-License-Identifier: MIT

//! MD (mission-data sink) endpoint.
//!
//! Uplink reads are bare mission-data ITMs; the source node comes from
//! configuration because mission-data headers carry none. Downlink writes
//! are held in a per-endpoint delay map and released on SOKF.

use super::{bind_udp, spawn_writer, wait_for_start};
use crate::config::dest_enabled;
use crate::delay_queue::DelayQueue;
use crate::fault::FaultHandle;
use crate::itm_delay::ItmDelay;
use crate::kframe::KFrameClock;
use crate::router::RouterEvent;
use anyhow::Result;
use mia_wire::itm::ItmHeader;
use mia_wire::limits::MAX_IP_PACKET_SIZE;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

pub struct MdEndpoint {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    clock: KFrameClock,
    delayed: DelayQueue<Vec<u8>>,
    enabled: bool,
}

impl MdEndpoint {
    /// Schedules a downlink ITM: destination from the header, source from
    /// configuration, delay from the route table. Zero delay bypasses the
    /// map and enters the write queue directly.
    pub fn send_downlink_itm(&mut self, itm: Vec<u8>, delays: &ItmDelay, local_node: u8) {
        if !self.enabled {
            return;
        }
        let dst = match ItmHeader::parse(&itm) {
            Ok(hdr) => hdr.dst_node(),
            Err(e) => {
                warn!(endpoint = "md", %e, "unroutable downlink ITM");
                return;
            }
        };
        let delay = delays.lookup(local_node, dst);
        if delay == 0 {
            let _ = self.tx.send(itm);
        } else {
            self.delayed.insert(self.clock.current() + u64::from(delay), itm);
        }
    }

    pub fn on_sokf(&mut self) {
        let frame = self.clock.advance();
        let mut due = Vec::new();
        self.delayed.drain_due(frame, &mut due);
        for itm in due {
            let _ = self.tx.send(itm);
        }
    }
}

pub fn spawn_md(
    listen: SocketAddr,
    dest: SocketAddr,
    local_node_id: u8,
    events: mpsc::UnboundedSender<RouterEvent>,
    mut start: watch::Receiver<bool>,
    shutdown: &broadcast::Sender<()>,
    faults: &FaultHandle,
) -> Result<(MdEndpoint, SocketAddr)> {
    let socket = Arc::new(bind_udp(listen)?);
    let local_addr = socket.local_addr()?;

    let (tx, queue) = mpsc::unbounded_channel();
    spawn_writer(
        "md",
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
                    info!(endpoint = "md", "read loop cancelled");
                    break;
                }
                res = socket.recv_from(&mut buf) => match res {
                    Ok((len, _)) => handle_read(&buf[..len], local_node_id, &events),
                    Err(e) => {
                        reader_faults.fatal("md", e);
                        break;
                    }
                },
            }
        }
    });

    Ok((
        MdEndpoint {
            tx,
            clock: KFrameClock::new(),
            delayed: DelayQueue::new(),
            enabled: dest_enabled(dest),
        },
        local_addr,
    ))
}

fn handle_read(datagram: &[u8], local_node_id: u8, events: &mpsc::UnboundedSender<RouterEvent>) {
    let hdr = match ItmHeader::parse(datagram) {
        Ok(hdr) => hdr,
        Err(_) => {
            warn!(endpoint = "md", len = datagram.len(), "datagram too short for ITM header");
            return;
        }
    };
    if !hdr.payload_len_valid(datagram.len()) {
        warn!(
            endpoint = "md",
            len = datagram.len(),
            vitm = hdr.is_vitm(),
            "ITM payload size out of bounds"
        );
        return;
    }
    let payload_type = hdr.payload_type();
    if !payload_type.is_mission_data() {
        warn!(
            endpoint = "md",
            payload_type = payload_type.bits(),
            "non-mission payload type on mission-data endpoint"
        );
        return;
    }
    let dst = hdr.dst_node();
    let _ = events.send(RouterEvent::UplinkItm {
        itm: datagram.to_vec(),
        src: local_node_id,
        dst,
    });
}
