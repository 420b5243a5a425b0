// SPDX-License-Identifier: MIT

//! VMW (vehicle wire gateway) endpoint.
//!
//! Downlink reads are framed batches split by the parser. Uplink writes
//! are delayed per route, merged by the batch builder on each SOKF, and
//! sent to the CP or DP destination chosen per finished message.

use super::{bind_udp, wait_for_start};
use crate::config::dest_enabled;
use crate::delay_queue::DelayQueue;
use crate::drop_policy::DropPolicySet;
use crate::fault::FaultHandle;
use crate::kframe::KFrameClock;
use crate::router::RouterEvent;
use crate::stats::Stats;
use anyhow::Result;
use mia_wire::builder::{BatchBuilder, Plane, UplinkMessage, UplinkPacket};
use mia_wire::itm::ItmHeader;
use mia_wire::limits::{MAX_IP_PACKET_SIZE, MPLS_HEADER_SIZE};
use mia_wire::parser::parse_batch;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

pub struct VmwEndpoint {
    tx: mpsc::UnboundedSender<UplinkMessage>,
    clock: KFrameClock,
    delayed: DelayQueue<UplinkPacket>,
    builder: BatchBuilder,
    cp_enabled: bool,
    dp_enabled: bool,
}

impl VmwEndpoint {
    /// Schedules an uplink packet. Zero delay feeds the current timeslot's
    /// builder immediately; otherwise the packet waits in the delay map.
    pub fn enqueue_uplink(&mut self, packet: UplinkPacket, delay: u32, to_sv: &mut DropPolicySet) {
        if delay == 0 {
            let mut out = Vec::new();
            self.builder
                .add_packet(packet, &mut |ty| to_sv.apply(ty), &mut out);
            self.dispatch(out);
        } else {
            self.delayed
                .insert(self.clock.current() + u64::from(delay), packet);
        }
    }

    /// Forwards an already-framed batch to the control plane unchanged.
    pub fn send_uplink_passthrough(&mut self, bytes: Vec<u8>) {
        self.dispatch(vec![UplinkMessage {
            plane: Plane::Cp,
            bytes,
        }]);
    }

    /// SOKF tick: release due packets through the builder, then flush
    /// whatever the timeslot accumulated.
    pub fn on_sokf(&mut self, to_sv: &mut DropPolicySet) {
        let frame = self.clock.advance();
        let mut due = Vec::new();
        self.delayed.drain_due(frame, &mut due);
        let mut out = Vec::new();
        for packet in due {
            self.builder
                .add_packet(packet, &mut |ty| to_sv.apply(ty), &mut out);
        }
        self.builder.finalize(&mut out);
        self.dispatch(out);
    }

    fn dispatch(&mut self, messages: Vec<UplinkMessage>) {
        for msg in messages {
            let enabled = match msg.plane {
                Plane::Cp => self.cp_enabled,
                Plane::Dp => self.dp_enabled,
            };
            if !enabled {
                continue;
            }
            let _ = self.tx.send(msg);
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn spawn_vmw(
    listen: SocketAddr,
    cp_dest: SocketAddr,
    dp_dest: SocketAddr,
    hpl_node_id: u8,
    events: mpsc::UnboundedSender<RouterEvent>,
    mut start: watch::Receiver<bool>,
    shutdown: &broadcast::Sender<()>,
    faults: &FaultHandle,
    stats: Arc<Stats>,
) -> Result<(VmwEndpoint, SocketAddr)> {
    let socket = Arc::new(bind_udp(listen)?);
    let local_addr = socket.local_addr()?;

    let (tx, mut queue) = mpsc::unbounded_channel::<UplinkMessage>();
    let writer_socket = socket.clone();
    let mut writer_shutdown = shutdown.subscribe();
    let writer_faults = faults.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_shutdown.recv() => {
                    info!(endpoint = "vmw", "write loop cancelled");
                    break;
                }
                item = queue.recv() => {
                    let Some(msg) = item else { break };
                    let dest = match msg.plane {
                        Plane::Cp => cp_dest,
                        Plane::Dp => dp_dest,
                    };
                    if let Err(e) = writer_socket.send_to(&msg.bytes, dest).await {
                        writer_faults.fatal("vmw", e);
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
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(endpoint = "vmw", "read loop cancelled");
                    break;
                }
                res = reader_socket.recv_from(&mut buf) => match res {
                    Ok((len, _)) => handle_read(&buf[..len], hpl_node_id, &events, &stats),
                    Err(e) => {
                        reader_faults.fatal("vmw", e);
                        break;
                    }
                },
            }
        }
    });

    Ok((
        VmwEndpoint {
            tx,
            clock: KFrameClock::new(),
            delayed: DelayQueue::new(),
            builder: BatchBuilder::new(),
            cp_enabled: dest_enabled(cp_dest),
            dp_enabled: dest_enabled(dp_dest),
        },
        local_addr,
    ))
}

fn handle_read(
    datagram: &[u8],
    hpl_node_id: u8,
    events: &mpsc::UnboundedSender<RouterEvent>,
    stats: &Stats,
) {
    let subs = match parse_batch(datagram) {
        Ok(subs) => subs,
        Err(e) => {
            warn!(endpoint = "vmw", %e, "discarding invalid batch");
            stats.increment_invalid();
            return;
        }
    };

    let mut pass_through = false;
    for sub in subs {
        // The parser guarantees room for both headers.
        let Ok(itm) = ItmHeader::parse(&sub[MPLS_HEADER_SIZE..]) else {
            continue;
        };
        if itm.dst_node() == hpl_node_id {
            pass_through = true;
        } else {
            let _ = events.send(RouterEvent::DownlinkMpls(sub.to_vec()));
        }
    }
    if pass_through {
        let _ = events.send(RouterEvent::DownlinkPassthrough(datagram.to_vec()));
    }
    stats.increment_converted();
}
