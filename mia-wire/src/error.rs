// SPDX-License-Identifier: MIT
// mia-wire/src/error.rs

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    Truncated,
    OuterLengthMismatch { declared: u32, actual: usize },
    SubLengthTooSmall(usize),
    SubPacketOverrun { wanted: usize, remaining: usize },
    BadFixedItmSize(usize),
    BadVitmSize(usize),
    BadSokfMsgId(u32),
    BadSokfMsgLen(u32),
    BadKFrameOffset(u32),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Truncated => write!(f, "buffer too short for header"),
            WireError::OuterLengthMismatch { declared, actual } => {
                write!(f, "declared message length {} != buffer length {}", declared, actual)
            }
            WireError::SubLengthTooSmall(len) => {
                write!(f, "sub-packet length {} below MPLS+ITM minimum", len)
            }
            WireError::SubPacketOverrun { wanted, remaining } => {
                write!(f, "sub-packet wants {} bytes, {} remain", wanted, remaining)
            }
            WireError::BadFixedItmSize(len) => {
                write!(f, "fixed ITM sub-packet has length {}", len)
            }
            WireError::BadVitmSize(len) => write!(f, "VITM sub-packet has length {}", len),
            WireError::BadSokfMsgId(id) => write!(f, "unexpected SOKF message id {:#010x}", id),
            WireError::BadSokfMsgLen(len) => write!(f, "unexpected SOKF message length {}", len),
            WireError::BadKFrameOffset(off) => write!(f, "k-frame offset {} out of range", off),
        }
    }
}

impl std::error::Error for WireError {}
