// SPDX-License-Identifier: MIT

//! Wire formats for the Mission Interface Adapter.
//!
//! Everything on the wire is big-endian. Header types are non-owning views
//! over byte buffers; they never outlive the buffer they were parsed from.

pub mod builder;
pub mod error;
pub mod ite;
pub mod itm;
pub mod limits;
pub mod mpls;
pub mod parser;
pub mod sokf;

pub use error::WireError;
pub use itm::{ItmFields, ItmHeader, PayloadType};
pub use mpls::MplsHeader;
