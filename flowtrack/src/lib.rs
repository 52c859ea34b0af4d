// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Component C2: periodically snapshots every IPv4 TCP/UDP socket on the host and publishes
//! the `(ip, port) → executable` and `port → executable` indexes the outbound diverter reads
//! lock-free.

#![deny(clippy::all)]

mod enumerate;
mod error;
mod pid_cache;
mod tables;
mod tracker;
mod windows_enumerate;
mod writer;

pub use enumerate::{SocketEnumerator, SocketRow};
pub use error::EnumerationError;
pub use pid_cache::PidExeCache;
pub use tables::FlowTables;
pub use tracker::{FlowTracker, NAT_MAX_ENTRIES, NAT_PRUNE_EVERY_CYCLES, POLL_INTERVAL};
pub use windows_enumerate::WindowsSocketEnumerator;
pub use writer::{FlowTableReader, FlowTableWriter};
