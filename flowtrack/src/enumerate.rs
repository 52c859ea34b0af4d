// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::net::Ipv4Addr;

use net::Port;
use portresolve::Pid;

use crate::error::EnumerationError;

/// One socket's local endpoint and owning process, as reported by a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketRow {
    /// The socket's bound local address. `0.0.0.0` for a wildcard bind.
    pub local_ip: Ipv4Addr,
    /// The socket's bound local port.
    pub local_port: Port,
    /// The owning process, if the OS reported a non-zero PID for this row.
    pub pid: Pid,
}

/// Synchronous, whole-table enumeration of every IPv4 TCP and UDP socket on the host.
///
/// Distinct from [`portresolve::PortResolver`]: that trait answers "who owns *this* port, right
/// now" with no caching; this one answers "what does the *entire* table look like this instant",
/// which is what the tracker needs to rebuild [`crate::FlowTables`] each cycle.
pub trait SocketEnumerator: Send {
    /// Every IPv4 TCP socket, including listeners.
    ///
    /// # Errors
    ///
    /// Returns [`EnumerationError::Tcp`] on failure; the tracker logs it and skips the cycle,
    /// leaving the previous tables in place.
    fn enumerate_tcp(&mut self) -> Result<Vec<SocketRow>, EnumerationError>;

    /// Every IPv4 UDP endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`EnumerationError::Udp`] on failure; the tracker logs it and skips the cycle,
    /// leaving the previous tables in place.
    fn enumerate_udp(&mut self) -> Result<Vec<SocketRow>, EnumerationError>;
}
