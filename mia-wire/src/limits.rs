// SPDX-License-Identifier: MIT

//! Canonical wire constants, the single source of truth.

/// Largest datagram any endpoint will read.
pub const MAX_IP_PACKET_SIZE: usize = 65_535;

pub const ITM_HEADER_SIZE: usize = 5;
pub const MPLS_HEADER_SIZE: usize = 4;
pub const ITE_HEADER_SIZE: usize = 2;

/// VMW outer header: message_id(4) + message_length(4).
pub const VMW_OUTER_HEADER_SIZE: usize = 8;
/// Network-order u16 prefixing every sub-packet (and the packet count).
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Fixed-size ITM payloads are exactly this long.
pub const FIXED_ITM_PAYLOAD_SIZE: usize = 43;
pub const MIN_VITM_PAYLOAD_SIZE: usize = 4;
pub const MAX_VITM_PAYLOAD_SIZE: usize = 1_024;

/// Smallest routable MPLS packet: MPLS header + ITM header.
pub const MIN_MPLS_PACKET_SIZE: usize = MPLS_HEADER_SIZE + ITM_HEADER_SIZE;
pub const FIXED_MPLS_PACKET_SIZE: usize = MIN_MPLS_PACKET_SIZE + FIXED_ITM_PAYLOAD_SIZE;
pub const MIN_MPLS_VITM_SIZE: usize = MIN_MPLS_PACKET_SIZE + MIN_VITM_PAYLOAD_SIZE;
pub const MAX_MPLS_VITM_SIZE: usize = MIN_MPLS_PACKET_SIZE + MAX_VITM_PAYLOAD_SIZE;

/// Byte budget of one VMW batch after the outer header and packet count.
pub const MAX_MPLS_BATCH_SIZE: usize = 38_880;
/// Packet-count flush threshold consulted while a timeslot is still open.
pub const VMW_COMMON_MAX_PACKETS_PER_TIMESLOT: usize = 1_000;

pub const TAC_SOKF_MSG_ID: u32 = 0x534F_4B46; // "SOKF"
pub const KBAND_RECV_MSG_ID: u32 = 0x4B42_5258; // "KBRX"
pub const SOKF_MSG_LEN: u32 = 12;
pub const MAX_KFRAME_OFFSET: u32 = 9;
pub const NUM_KFRAME_OFFSETS: u32 = MAX_KFRAME_OFFSET + 1;

const _: () = assert!(FIXED_MPLS_PACKET_SIZE + LENGTH_PREFIX_SIZE == 54);
const _: () = assert!(MAX_MPLS_BATCH_SIZE % (FIXED_MPLS_PACKET_SIZE + LENGTH_PREFIX_SIZE) == 0);
