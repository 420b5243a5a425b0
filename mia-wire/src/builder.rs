// SPDX-License-Identifier: MIT

//! VMW uplink batch builder.
//!
//! Individually scheduled uplink MPLS packets are merged into framed
//! batches, grouped by destination plane and bounded by
//! [`MAX_MPLS_BATCH_SIZE`]. Mission-data payload types go to the data
//! plane; everything else goes to the control plane after the toSv drop
//! policy has had its say.

use crate::error::WireError;
use crate::ite::{IteHeader, IteKind};
use crate::itm::{ItmHeader, PayloadType};
use crate::limits::{
    ITM_HEADER_SIZE, KBAND_RECV_MSG_ID, LENGTH_PREFIX_SIZE, MAX_MPLS_BATCH_SIZE,
    MIN_MPLS_PACKET_SIZE, MPLS_HEADER_SIZE, VMW_COMMON_MAX_PACKETS_PER_TIMESLOT,
    VMW_OUTER_HEADER_SIZE,
};
use crate::mpls::{qos, MplsHeader};

/// Destination plane of the VMW peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Cp,
    Dp,
}

/// One scheduled uplink packet: `[u16 length][MPLS header][ITM bytes]`,
/// tagged with its payload type so the builder can pick the plane.
#[derive(Debug, Clone)]
pub struct UplinkPacket {
    pub payload_type: PayloadType,
    pub bytes: Vec<u8>,
}

/// A finished batch bound for one of the two VMW destinations.
#[derive(Debug, Clone)]
pub struct UplinkMessage {
    pub plane: Plane,
    pub bytes: Vec<u8>,
}

/// Wraps an ITM/VITM in a fake IMPLS label and prefixes the sub-packet
/// length. Fixed-size mission-data payloads lose their last byte, matching
/// the downstream hardware.
pub fn synthesize_uplink(
    mut itm: Vec<u8>,
    qos_for_ite_data: u8,
) -> Result<UplinkPacket, WireError> {
    let hdr = ItmHeader::parse(&itm)?;
    let payload_type = hdr.payload_type();
    let vitm = hdr.is_vitm();

    let chosen_qos = if vitm {
        match IteHeader::parse(&itm[ITM_HEADER_SIZE..])?.kind() {
            IteKind::Control => qos::OAM,
            IteKind::Data => qos_for_ite_data,
        }
    } else {
        payload_type.bits()
    };

    if !vitm && payload_type.is_mission_data() {
        itm.pop();
    }

    let mpls = MplsHeader::fake_impls(chosen_qos);
    let sub_len = (MPLS_HEADER_SIZE + itm.len()) as u16;
    let mut bytes = Vec::with_capacity(LENGTH_PREFIX_SIZE + sub_len as usize);
    bytes.extend_from_slice(&sub_len.to_be_bytes());
    bytes.extend_from_slice(&mpls.encode());
    bytes.extend_from_slice(&itm);
    Ok(UplinkPacket {
        payload_type,
        bytes,
    })
}

/// Prefixes a pre-wrapped MPLS packet (already `[MPLS][ITM..]`) with its
/// length and tags it by the embedded payload type.
pub fn wrap_uplink_mpls(mpls_packet: Vec<u8>) -> Result<UplinkPacket, WireError> {
    if mpls_packet.len() < MIN_MPLS_PACKET_SIZE {
        return Err(WireError::Truncated);
    }
    let payload_type = ItmHeader::parse(&mpls_packet[MPLS_HEADER_SIZE..])?.payload_type();
    let mut bytes = Vec::with_capacity(LENGTH_PREFIX_SIZE + mpls_packet.len());
    bytes.extend_from_slice(&(mpls_packet.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&mpls_packet);
    Ok(UplinkPacket {
        payload_type,
        bytes,
    })
}

fn build_batch(packets: &[UplinkPacket]) -> Vec<u8> {
    let body: usize = packets.iter().map(|p| p.bytes.len()).sum();
    let total = VMW_OUTER_HEADER_SIZE + LENGTH_PREFIX_SIZE + body;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&KBAND_RECV_MSG_ID.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&(packets.len() as u16).to_be_bytes());
    for p in packets {
        out.extend_from_slice(&p.bytes);
    }
    let total = (out.len() as u32).to_be_bytes();
    out[4..8].copy_from_slice(&total);
    out
}

/// Per-timeslot accumulator pair. `finalize` empties both accumulators, so
/// state never crosses a SOKF tick.
#[derive(Default)]
pub struct BatchBuilder {
    pending_control: Vec<UplinkPacket>,
    pending_control_bytes: usize,
    pending_data: Vec<UplinkPacket>,
    pending_data_bytes: usize,
}

impl BatchBuilder {
    pub fn new() -> BatchBuilder {
        BatchBuilder::default()
    }

    /// Routes `packet` to its plane accumulator. CP packets are first run
    /// through `drop_to_sv`; a true return discards the packet before it
    /// touches any queue.
    pub fn add_packet(
        &mut self,
        packet: UplinkPacket,
        drop_to_sv: &mut dyn FnMut(PayloadType) -> bool,
        out: &mut Vec<UplinkMessage>,
    ) {
        let plane = if packet.payload_type.is_mission_data() {
            Plane::Dp
        } else {
            if drop_to_sv(packet.payload_type) {
                return;
            }
            Plane::Cp
        };

        let need = packet.bytes.len();
        let (pending, pending_bytes) = match plane {
            Plane::Cp => (&mut self.pending_control, &mut self.pending_control_bytes),
            Plane::Dp => (&mut self.pending_data, &mut self.pending_data_bytes),
        };
        if *pending_bytes + need > MAX_MPLS_BATCH_SIZE {
            let full = std::mem::take(pending);
            *pending_bytes = 0;
            out.push(UplinkMessage {
                plane,
                bytes: build_batch(&full),
            });
        }
        let (pending, pending_bytes) = match plane {
            Plane::Cp => (&mut self.pending_control, &mut self.pending_control_bytes),
            Plane::Dp => (&mut self.pending_data, &mut self.pending_data_bytes),
        };
        *pending_bytes += need;
        pending.push(packet);

        self.write_if_ready(VMW_COMMON_MAX_PACKETS_PER_TIMESLOT, out);
    }

    /// End-of-timeslot flush: everything still pending goes out, CP first.
    pub fn finalize(&mut self, out: &mut Vec<UplinkMessage>) {
        self.write_if_ready(1, out);
    }

    fn write_if_ready(&mut self, threshold: usize, out: &mut Vec<UplinkMessage>) {
        if self.pending_control.len() >= threshold {
            let full = std::mem::take(&mut self.pending_control);
            self.pending_control_bytes = 0;
            out.push(UplinkMessage {
                plane: Plane::Cp,
                bytes: build_batch(&full),
            });
        }
        if self.pending_data.len() >= threshold {
            let full = std::mem::take(&mut self.pending_data);
            self.pending_data_bytes = 0;
            out.push(UplinkMessage {
                plane: Plane::Dp,
                bytes: build_batch(&full),
            });
        }
    }
}
