// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

/// Which way a packet was travelling when the capture layer intercepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Leaving the host.
    Outbound,
    /// Arriving at the host.
    Inbound,
}
