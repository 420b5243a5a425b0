// SPDX-License-Identifier: MIT

//! Static and dynamic configuration types.
//!
//! A destination whose address is 0.0.0.0 or whose port is 0 is the
//! sentinel "disabled" value: packets bound for it are dropped silently.

use crate::drop_policy::DropAlgorithm;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const INVALID_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const INVALID_PORT: u16 = 0;

pub fn dest_enabled(addr: SocketAddr) -> bool {
    addr.ip() != INVALID_IP && addr.port() != INVALID_PORT
}

fn disabled_dest() -> SocketAddr {
    SocketAddr::new(INVALID_IP, INVALID_PORT)
}

fn default_udp_checksum() -> bool {
    true
}

fn default_ite_data_qos() -> u8 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    pub tpn_listen: SocketAddr,
    pub vmw_listen: SocketAddr,
    pub kba_listen: SocketAddr,
    pub mission_data_listen: SocketAddr,
    pub sokf_listen: SocketAddr,

    #[serde(default = "disabled_dest")]
    pub cp_vmw_dest: SocketAddr,
    #[serde(default = "disabled_dest")]
    pub dp_vmw_dest: SocketAddr,
    #[serde(default = "disabled_dest")]
    pub kba_dest: SocketAddr,
    #[serde(default = "disabled_dest")]
    pub mission_data_dest: SocketAddr,

    /// Node id this adapter speaks for on the simulator side.
    pub local_node_id: u8,
    /// Destination node id that flips a downlink batch to pass-through.
    pub hpl_node_id: u8,
    /// Destination nodes whose mission-data downlink bypasses TPN.
    #[serde(default)]
    pub bypass_tpn_nodes: Vec<u8>,

    #[serde(default = "default_udp_checksum")]
    pub udp_checksum: bool,
    /// Default route delay, in K-frames.
    #[serde(default)]
    pub itm_delay: u32,
    #[serde(default)]
    pub route_delays: Vec<RouteDelay>,
    #[serde(default)]
    pub to_sim_drop: Vec<DropRule>,
    #[serde(default)]
    pub to_sv_drop: Vec<DropRule>,

    #[serde(default = "default_ite_data_qos")]
    pub mpls_qos_for_ite_data: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RouteDelay {
    pub sv_node: u8,
    pub sim_node: u8,
    pub delay: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DropRule {
    pub payload_type: u8,
    pub algorithm: DropAlgorithm,
    #[serde(default)]
    pub interval: u32,
}

/// One dynamic-configuration command. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigChange {
    pub udp_checksum: Option<bool>,
    pub itm_delay: Option<u32>,
    pub route_delay: Option<RouteDelay>,
    pub to_sim_drop: Option<DropRule>,
    pub to_sv_drop: Option<DropRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_detection() {
        assert!(!dest_enabled("0.0.0.0:9000".parse().unwrap()));
        assert!(!dest_enabled("127.0.0.1:0".parse().unwrap()));
        assert!(dest_enabled("127.0.0.1:9000".parse().unwrap()));
    }
}
