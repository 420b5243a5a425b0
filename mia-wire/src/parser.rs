// SPDX-License-Identifier: MIT

//! VMW downlink batch decoder.
//!
//! A batch is `{message_id: u32, message_length: u32}` followed by a u16
//! count of MPLS sub-packets, each prefixed with its own u16 length. All
//! integers network order. Any malformed unit aborts the whole batch.

use crate::error::WireError;
use crate::itm::ItmHeader;
use crate::limits::{
    FIXED_MPLS_PACKET_SIZE, LENGTH_PREFIX_SIZE, MAX_MPLS_VITM_SIZE, MIN_MPLS_PACKET_SIZE,
    MIN_MPLS_VITM_SIZE, MPLS_HEADER_SIZE, VMW_OUTER_HEADER_SIZE,
};
use tracing::warn;

struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn mine_u16(&mut self) -> Result<u16, WireError> {
        if self.rest.len() < 2 {
            return Err(WireError::Truncated);
        }
        let value = u16::from_be_bytes([self.rest[0], self.rest[1]]);
        self.rest = &self.rest[2..];
        Ok(value)
    }

    fn mine_u32(&mut self) -> Result<u32, WireError> {
        if self.rest.len() < 4 {
            return Err(WireError::Truncated);
        }
        let value = u32::from_be_bytes([self.rest[0], self.rest[1], self.rest[2], self.rest[3]]);
        self.rest = &self.rest[4..];
        Ok(value)
    }

    fn mine_window(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if self.rest.len() < len {
            return Err(WireError::SubPacketOverrun {
                wanted: len,
                remaining: self.rest.len(),
            });
        }
        let (window, rest) = self.rest.split_at(len);
        self.rest = rest;
        Ok(window)
    }
}

/// Decodes a received VMW batch into non-owning sub-packet windows, each
/// spanning `[MPLS header | ITM header | payload]` without its length prefix.
pub fn parse_batch(buf: &[u8]) -> Result<Vec<&[u8]>, WireError> {
    if buf.len() < VMW_OUTER_HEADER_SIZE {
        return Err(WireError::Truncated);
    }
    let mut cursor = Cursor { rest: buf };
    let _message_id = cursor.mine_u32()?;
    let message_length = cursor.mine_u32()?;
    if message_length as usize != buf.len() {
        return Err(WireError::OuterLengthMismatch {
            declared: message_length,
            actual: buf.len(),
        });
    }

    let num_packets = cursor.mine_u16()?;
    let mut subs = Vec::with_capacity(num_packets as usize);
    for _ in 0..num_packets {
        let sub_len = cursor.mine_u16()? as usize;
        if sub_len < MIN_MPLS_PACKET_SIZE {
            return Err(WireError::SubLengthTooSmall(sub_len));
        }
        subs.push(cursor.mine_window(sub_len)?);
    }

    for sub in &subs {
        let itm = ItmHeader::parse(&sub[MPLS_HEADER_SIZE..])?;
        if itm.is_vitm() {
            if !(MIN_MPLS_VITM_SIZE..=MAX_MPLS_VITM_SIZE).contains(&sub.len()) {
                return Err(WireError::BadVitmSize(sub.len()));
            }
        } else if sub.len() != FIXED_MPLS_PACKET_SIZE {
            return Err(WireError::BadFixedItmSize(sub.len()));
        }
    }

    if !cursor.rest.is_empty() {
        warn!(
            trailing = cursor.rest.len(),
            "batch carries extraneous trailing bytes"
        );
    }
    Ok(subs)
}

/// Encodes a batch from raw sub-packet contents (no length prefixes).
/// Test-side counterpart of [`parse_batch`]; the uplink path uses the
/// builder instead.
pub fn encode_batch(message_id: u32, subs: &[&[u8]]) -> Vec<u8> {
    let body: usize = subs.iter().map(|s| s.len() + LENGTH_PREFIX_SIZE).sum();
    let total = VMW_OUTER_HEADER_SIZE + LENGTH_PREFIX_SIZE + body;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&message_id.to_be_bytes());
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(subs.len() as u16).to_be_bytes());
    for sub in subs {
        out.extend_from_slice(&(sub.len() as u16).to_be_bytes());
        out.extend_from_slice(sub);
    }
    out
}
