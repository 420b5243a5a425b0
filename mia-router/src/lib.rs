// SPDX-License-Identifier: MIT

//! Mission Interface Adapter runtime.
//!
//! Five UDP endpoints arranged around a single router task: downlink
//! batches from VMW are split and fanned out to TPN / MD / KBA, uplink
//! packets from the ground peers are delayed by K-frame count and batched
//! back to VMW. All mutable routing state lives on the router task; other
//! tasks talk to it through its event queue.

pub mod config;
pub mod delay_queue;
pub mod drop_policy;
pub mod endpoint;
pub mod fault;
pub mod itm_delay;
pub mod kframe;
pub mod router;
pub mod stats;

pub use config::{ConfigChange, RouterConfig};
pub use fault::{fault_channel, FaultHandle};
pub use router::{spawn_router, BoundAddrs, RouterHandle};
pub use stats::Stats;
