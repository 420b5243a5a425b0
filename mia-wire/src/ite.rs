// SPDX-License-Identifier: MIT

//! ITE common header: 2 bytes. The first bit distinguishes Data (1) from
//! Control (0); the second byte is the source node id.

use crate::error::WireError;
use crate::limits::ITE_HEADER_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteKind {
    Control,
    Data,
}

#[derive(Clone, Copy, Debug)]
pub struct IteHeader<'a> {
    bytes: &'a [u8],
}

impl<'a> IteHeader<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<IteHeader<'a>, WireError> {
        if bytes.len() < ITE_HEADER_SIZE {
            return Err(WireError::Truncated);
        }
        Ok(IteHeader { bytes })
    }

    pub fn kind(&self) -> IteKind {
        if self.bytes[0] & 0x80 != 0 {
            IteKind::Data
        } else {
            IteKind::Control
        }
    }

    pub fn src_node(&self) -> u8 {
        self.bytes[1]
    }
}

/// Writes a 2-byte ITE common header. Test helper.
pub fn write_ite_header(buf: &mut [u8], kind: IteKind, src_node: u8) {
    assert!(buf.len() >= ITE_HEADER_SIZE);
    buf[0] = match kind {
        IteKind::Data => 0x80,
        IteKind::Control => 0x00,
    };
    buf[1] = src_node;
}
