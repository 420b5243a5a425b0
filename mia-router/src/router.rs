// SPDX-License-Identifier: MIT

//! Central dispatcher.
//!
//! The router task owns every piece of mutable routing state: the delay
//! table, both drop-policy families, the per-endpoint delay maps and the
//! batch builder. Other tasks and threads reach it only through the
//! [`RouterHandle`] event queue, whose non-blocking send is the sole
//! cross-task synchronization in the core.

use crate::config::{dest_enabled, ConfigChange, RouterConfig};
use crate::drop_policy::DropPolicySet;
use crate::endpoint::kba::{spawn_kba, KbaEndpoint};
use crate::endpoint::md::{spawn_md, MdEndpoint};
use crate::endpoint::sokf::spawn_sokf;
use crate::endpoint::tpn::{spawn_tpn, TpnEndpoint};
use crate::endpoint::vmw::{spawn_vmw, VmwEndpoint};
use crate::fault::FaultHandle;
use crate::itm_delay::ItmDelay;
use crate::stats::Stats;
use anyhow::Result;
use mia_wire::builder::{synthesize_uplink, wrap_uplink_mpls};
use mia_wire::itm::ItmHeader;
use mia_wire::limits::MPLS_HEADER_SIZE;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

/// Work items posted to the router task.
#[derive(Debug)]
pub enum RouterEvent {
    Start,
    ApplyConfigDefaults,
    ApplyConfig(ConfigChange),
    TpnPeer(SocketAddr),
    /// Whole batch from KBA bound for the VMW control plane.
    UplinkPassthrough(Vec<u8>),
    /// Bare ITM/VITM to wrap, delay and batch toward VMW.
    UplinkItm { itm: Vec<u8>, src: u8, dst: u8 },
    /// Pre-wrapped MPLS packet to delay and batch toward VMW.
    UplinkMpls { packet: Vec<u8>, src: u8, dst: u8 },
    /// Whole batch from VMW bound for KBA.
    DownlinkPassthrough(Vec<u8>),
    /// One downlink MPLS sub-packet to fan out to TPN or MD.
    DownlinkMpls(Vec<u8>),
    Sokf,
}

/// Thread-safe front door to the router task. All methods post an event
/// and return immediately.
#[derive(Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<RouterEvent>,
}

impl RouterHandle {
    /// Starts reading on all endpoints.
    pub fn start(&self) {
        let _ = self.tx.send(RouterEvent::Start);
    }

    pub fn apply_config_defaults(&self) {
        let _ = self.tx.send(RouterEvent::ApplyConfigDefaults);
    }

    pub fn apply_config(&self, change: ConfigChange) {
        let _ = self.tx.send(RouterEvent::ApplyConfig(change));
    }

    pub fn route_uplink_passthrough(&self, buf: Vec<u8>) {
        let _ = self.tx.send(RouterEvent::UplinkPassthrough(buf));
    }

    pub fn route_uplink_itm(&self, itm: Vec<u8>, src: u8, dst: u8) {
        let _ = self.tx.send(RouterEvent::UplinkItm { itm, src, dst });
    }

    pub fn route_uplink_mpls(&self, packet: Vec<u8>, src: u8, dst: u8) {
        let _ = self.tx.send(RouterEvent::UplinkMpls { packet, src, dst });
    }

    pub fn route_downlink_passthrough(&self, buf: Vec<u8>) {
        let _ = self.tx.send(RouterEvent::DownlinkPassthrough(buf));
    }

    pub fn route_downlink_mpls(&self, packet: Vec<u8>) {
        let _ = self.tx.send(RouterEvent::DownlinkMpls(packet));
    }
}

/// Local addresses the endpoints actually bound, for configs that ask for
/// ephemeral ports.
#[derive(Debug, Clone, Copy)]
pub struct BoundAddrs {
    pub tpn: SocketAddr,
    pub vmw: SocketAddr,
    pub kba: SocketAddr,
    pub mission_data: SocketAddr,
    pub sokf: SocketAddr,
}

struct Router {
    cfg: RouterConfig,
    boot_udp_checksum: bool,
    delays: ItmDelay,
    to_sim: DropPolicySet,
    to_sv: DropPolicySet,
    tpn: TpnEndpoint,
    md: MdEndpoint,
    vmw: VmwEndpoint,
    kba: KbaEndpoint,
    start_tx: watch::Sender<bool>,
}

impl Router {
    fn handle(&mut self, event: RouterEvent) {
        match event {
            RouterEvent::Start => {
                info!("starting endpoint read loops");
                let _ = self.start_tx.send(true);
            }
            RouterEvent::ApplyConfigDefaults => self.apply_config_defaults(),
            RouterEvent::ApplyConfig(change) => self.apply_config(change),
            RouterEvent::TpnPeer(addr) => self.tpn.set_peer(addr),
            RouterEvent::UplinkPassthrough(buf) => self.route_uplink_passthrough(buf),
            RouterEvent::UplinkItm { itm, src, dst } => self.route_uplink_itm(itm, src, dst),
            RouterEvent::UplinkMpls { packet, src, dst } => {
                self.route_uplink_mpls(packet, src, dst)
            }
            RouterEvent::DownlinkPassthrough(buf) => self.kba.send_downlink(buf),
            RouterEvent::DownlinkMpls(packet) => self.route_downlink_mpls(packet),
            RouterEvent::Sokf => self.handle_sokf(),
        }
    }

    fn apply_config_defaults(&mut self) {
        info!("resetting dynamic configuration to defaults");
        self.delays.reset_to_defaults();
        self.to_sim.reset_to_defaults();
        self.to_sv.reset_to_defaults();
        self.cfg.udp_checksum = self.boot_udp_checksum;
        self.tpn.apply_udp_checksum(self.cfg.udp_checksum);
    }

    fn apply_config(&mut self, change: ConfigChange) {
        if let Some(enabled) = change.udp_checksum {
            self.cfg.udp_checksum = enabled;
            self.tpn.apply_udp_checksum(enabled);
        }
        if let Some(frames) = change.itm_delay {
            self.delays.set_default(frames);
        }
        if let Some(route) = change.route_delay {
            self.delays.set_route(route.sim_node, route.sv_node, route.delay);
        }
        if let Some(rule) = change.to_sim_drop {
            self.to_sim.configure(rule);
        }
        if let Some(rule) = change.to_sv_drop {
            self.to_sv.configure(rule);
        }
    }

    fn route_uplink_passthrough(&mut self, buf: Vec<u8>) {
        if !dest_enabled(self.cfg.cp_vmw_dest) {
            return;
        }
        self.vmw.send_uplink_passthrough(buf);
    }

    fn route_uplink_itm(&mut self, itm: Vec<u8>, src: u8, dst: u8) {
        match synthesize_uplink(itm, self.cfg.mpls_qos_for_ite_data) {
            Ok(packet) => {
                let delay = self.delays.lookup(src, dst);
                self.vmw.enqueue_uplink(packet, delay, &mut self.to_sv);
            }
            Err(e) => warn!(%e, "dropping unsynthesizable uplink ITM"),
        }
    }

    fn route_uplink_mpls(&mut self, packet: Vec<u8>, src: u8, dst: u8) {
        match wrap_uplink_mpls(packet) {
            Ok(packet) => {
                let delay = self.delays.lookup(src, dst);
                self.vmw.enqueue_uplink(packet, delay, &mut self.to_sv);
            }
            Err(e) => warn!(%e, "dropping malformed uplink MPLS packet"),
        }
    }

    fn route_downlink_mpls(&mut self, packet: Vec<u8>) {
        let Some(tail) = packet.get(MPLS_HEADER_SIZE..) else {
            warn!(len = packet.len(), "downlink packet shorter than MPLS header");
            return;
        };
        let itm = match ItmHeader::parse(tail) {
            Ok(hdr) => hdr,
            Err(e) => {
                warn!(%e, "dropping downlink packet with malformed ITM header");
                return;
            }
        };
        let payload_type = itm.payload_type();
        let dst = itm.dst_node();
        if self.cfg.bypass_tpn_nodes.contains(&dst) && payload_type.is_mission_data() {
            let itm_bytes = packet[MPLS_HEADER_SIZE..].to_vec();
            self.md
                .send_downlink_itm(itm_bytes, &self.delays, self.cfg.local_node_id);
        } else if !self.to_sim.apply(payload_type) {
            self.tpn.send_downlink(packet);
        }
    }

    /// K-frame notifications fan out to TPN, then VMW, then MD.
    fn handle_sokf(&mut self) {
        self.tpn.on_sokf();
        self.vmw.on_sokf(&mut self.to_sv);
        self.md.on_sokf();
    }
}

/// Binds all five sockets, spawns the endpoint tasks and the router task.
/// Reading begins once [`RouterHandle::start`] is called.
pub fn spawn_router(
    cfg: RouterConfig,
    stats: Arc<Stats>,
    shutdown: &broadcast::Sender<()>,
    faults: FaultHandle,
) -> Result<(RouterHandle, BoundAddrs)> {
    let (events, mut event_rx) = mpsc::unbounded_channel();
    let (start_tx, start_rx) = watch::channel(false);

    let (tpn, tpn_addr) = spawn_tpn(
        cfg.tpn_listen,
        events.clone(),
        start_rx.clone(),
        shutdown,
        &faults,
    )?;
    let (vmw, vmw_addr) = spawn_vmw(
        cfg.vmw_listen,
        cfg.cp_vmw_dest,
        cfg.dp_vmw_dest,
        cfg.hpl_node_id,
        events.clone(),
        start_rx.clone(),
        shutdown,
        &faults,
        stats.clone(),
    )?;
    let (kba, kba_addr) = spawn_kba(
        cfg.kba_listen,
        cfg.kba_dest,
        events.clone(),
        start_rx.clone(),
        shutdown,
        &faults,
    )?;
    let (md, md_addr) = spawn_md(
        cfg.mission_data_listen,
        cfg.mission_data_dest,
        cfg.local_node_id,
        events.clone(),
        start_rx.clone(),
        shutdown,
        &faults,
    )?;
    let sokf_addr = spawn_sokf(
        cfg.sokf_listen,
        events.clone(),
        start_rx,
        shutdown,
        &faults,
        stats,
    )?;

    tpn.apply_udp_checksum(cfg.udp_checksum);

    let addrs = BoundAddrs {
        tpn: tpn_addr,
        vmw: vmw_addr,
        kba: kba_addr,
        mission_data: md_addr,
        sokf: sokf_addr,
    };

    let mut router = Router {
        boot_udp_checksum: cfg.udp_checksum,
        delays: ItmDelay::new(cfg.itm_delay, &cfg.route_delays),
        to_sim: DropPolicySet::new(&cfg.to_sim_drop),
        to_sv: DropPolicySet::new(&cfg.to_sv_drop),
        cfg,
        tpn,
        md,
        vmw,
        kba,
        start_tx,
    };

    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("router task stopping");
                    break;
                }
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    router.handle(event);
                }
            }
        }
    });

    Ok((RouterHandle { tx: events }, addrs))
}
