// SPDX-License-Identifier: MIT

//! Start-of-K-frame timing datagram: `{msg_id: u32, msg_len: u32,
//! kframe_offset: u32}`, network order, 12 bytes on the wire.

use crate::error::WireError;
use crate::limits::{MAX_KFRAME_OFFSET, SOKF_MSG_LEN, TAC_SOKF_MSG_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SokfMessage {
    pub msg_id: u32,
    pub msg_len: u32,
    pub kframe_offset: u32,
}

impl SokfMessage {
    /// Decodes a 12-byte datagram. Size mismatches are the caller's
    /// warn-and-continue path; field violations (see [`SokfMessage::check`])
    /// are fatal to the listener.
    pub fn decode(bytes: &[u8]) -> Result<SokfMessage, WireError> {
        if bytes.len() != SOKF_MSG_LEN as usize {
            return Err(WireError::Truncated);
        }
        Ok(SokfMessage {
            msg_id: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            msg_len: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            kframe_offset: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        })
    }

    pub fn check(&self) -> Result<(), WireError> {
        if self.msg_id != TAC_SOKF_MSG_ID {
            return Err(WireError::BadSokfMsgId(self.msg_id));
        }
        if self.msg_len != SOKF_MSG_LEN {
            return Err(WireError::BadSokfMsgLen(self.msg_len));
        }
        if self.kframe_offset > MAX_KFRAME_OFFSET {
            return Err(WireError::BadKFrameOffset(self.kframe_offset));
        }
        Ok(())
    }

    pub fn encode(offset: u32) -> [u8; SOKF_MSG_LEN as usize] {
        let mut out = [0u8; SOKF_MSG_LEN as usize];
        out[0..4].copy_from_slice(&TAC_SOKF_MSG_ID.to_be_bytes());
        out[4..8].copy_from_slice(&SOKF_MSG_LEN.to_be_bytes());
        out[8..12].copy_from_slice(&offset.to_be_bytes());
        out
    }
}
