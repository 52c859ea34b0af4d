// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4/TCP/UDP packet types shared by the split-tunnel diversion engine.
//!
//! This crate intentionally does not provide a zero-copy parsing framework: the engine only
//! ever touches two fields of an intercepted packet (the IPv4 source or destination address)
//! and must do so in place, on the buffer handed back by the capture layer, without an
//! intermediate allocation. [`Ipv4PacketMut`] is a thin view over such a buffer.

mod checksum;
mod packet;
mod port;
mod protocol;

pub use checksum::incremental_update_32;
pub use packet::{Ipv4PacketMut, PacketError};
pub use port::{Port, PortError};
pub use protocol::TransportProtocol;

use std::net::Ipv4Addr;

/// A local or remote IPv4 transport endpoint: an address plus a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Endpoint {
    /// The IPv4 address of the endpoint.
    pub addr: Ipv4Addr,
    /// The transport-layer port of the endpoint.
    pub port: Port,
}

impl Ipv4Endpoint {
    /// Build an endpoint from its parts.
    #[must_use]
    pub fn new(addr: Ipv4Addr, port: Port) -> Self {
        Self { addr, port }
    }
}

/// An opaque OS interface identifier (e.g. Windows' `IfIndex`, used when re-injecting a packet
/// on a specific adapter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IfIndex(u32);

impl IfIndex {
    /// Wrap a raw interface index.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw interface index.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for IfIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
