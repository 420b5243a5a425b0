// SPDX-License-Identifier: MIT
#![allow(dead_code)]

//! Shared harness for the loopback integration tests: real sockets on
//! ephemeral ports, test-owned peers standing in for TPN, KBA, MD and the
//! two VMW planes.

use mia_router::config::RouterConfig;
use mia_router::{fault_channel, spawn_router, BoundAddrs, RouterHandle, Stats};
use mia_wire::itm::ItmFields;
use mia_wire::limits::{FIXED_ITM_PAYLOAD_SIZE, ITM_HEADER_SIZE, MPLS_HEADER_SIZE};
use mia_wire::mpls::MplsHeader;
use mia_wire::parser::encode_batch;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};

pub const LOCAL_NODE: u8 = 1;
pub const HPL_NODE: u8 = 200;
pub const BYPASS_NODE: u8 = 5;

pub struct Harness {
    pub handle: RouterHandle,
    pub addrs: BoundAddrs,
    pub stats: Arc<Stats>,
    pub faults: mpsc::UnboundedReceiver<String>,
    pub tpn_peer: UdpSocket,
    pub kba_dest: UdpSocket,
    pub md_dest: UdpSocket,
    pub cp_dest: UdpSocket,
    pub dp_dest: UdpSocket,
    pub driver: UdpSocket,
    _shutdown: broadcast::Sender<()>,
}

pub async fn start(mutate: impl FnOnce(&mut RouterConfig)) -> Harness {
    let tpn_peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let kba_dest = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let md_dest = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let cp_dest = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let dp_dest = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let driver = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let mut cfg = RouterConfig {
        tpn_listen: "127.0.0.1:0".parse().unwrap(),
        vmw_listen: "127.0.0.1:0".parse().unwrap(),
        kba_listen: "127.0.0.1:0".parse().unwrap(),
        mission_data_listen: "127.0.0.1:0".parse().unwrap(),
        sokf_listen: "127.0.0.1:0".parse().unwrap(),
        cp_vmw_dest: cp_dest.local_addr().unwrap(),
        dp_vmw_dest: dp_dest.local_addr().unwrap(),
        kba_dest: kba_dest.local_addr().unwrap(),
        mission_data_dest: md_dest.local_addr().unwrap(),
        local_node_id: LOCAL_NODE,
        hpl_node_id: HPL_NODE,
        bypass_tpn_nodes: vec![BYPASS_NODE],
        udp_checksum: true,
        itm_delay: 0,
        route_delays: Vec::new(),
        to_sim_drop: Vec::new(),
        to_sv_drop: Vec::new(),
        mpls_qos_for_ite_data: 5,
    };
    mutate(&mut cfg);

    let (shutdown, _) = broadcast::channel(1);
    let (fault_handle, faults) = fault_channel();
    let stats = Stats::new();
    let (handle, addrs) = spawn_router(cfg, stats.clone(), &shutdown, fault_handle).unwrap();
    handle.start();
    settle().await;

    Harness {
        handle,
        addrs,
        stats,
        faults,
        tpn_peer,
        kba_dest,
        md_dest,
        cp_dest,
        dp_dest,
        driver,
        _shutdown: shutdown,
    }
}

/// Lets spawned tasks observe the latest datagrams before assertions.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(80)).await;
}

pub async fn recv(sock: &UdpSocket) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; 65_535];
    match tokio::time::timeout(Duration::from_millis(500), sock.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
        _ => None,
    }
}

pub async fn expect_quiet(sock: &UdpSocket) {
    let mut buf = vec![0u8; 65_535];
    let res = tokio::time::timeout(Duration::from_millis(150), sock.recv_from(&mut buf)).await;
    assert!(res.is_err(), "expected no datagram, got one");
}

/// Bare fixed ITM as the MD and TPN peers send it: header + 43-byte payload.
pub fn fixed_itm(payload_type_bits: u8, dst_node: u8, src_node: u8) -> Vec<u8> {
    let mut itm = vec![0u8; ITM_HEADER_SIZE + FIXED_ITM_PAYLOAD_SIZE];
    ItmFields {
        payload_type_bits,
        dst_node,
        byte2: src_node,
        ..Default::default()
    }
    .write(&mut itm);
    itm
}

/// Downlink-shaped MPLS sub-packet: label + fixed ITM.
pub fn fixed_sub(payload_type_bits: u8, dst_node: u8) -> Vec<u8> {
    let mut sub = vec![0u8; MPLS_HEADER_SIZE + ITM_HEADER_SIZE + FIXED_ITM_PAYLOAD_SIZE];
    sub[..MPLS_HEADER_SIZE]
        .copy_from_slice(&MplsHeader::fake_impls(payload_type_bits).encode());
    ItmFields {
        payload_type_bits,
        dst_node,
        ..Default::default()
    }
    .write(&mut sub[MPLS_HEADER_SIZE..]);
    sub
}

pub fn batch_of(subs: &[&[u8]]) -> Vec<u8> {
    encode_batch(0x0102_0304, subs)
}
