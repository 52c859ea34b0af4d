// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::net::Ipv4Addr;

use thiserror::Error;

/// The reasons a requested [`crate::EngineConfig`] may be rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The VPN and default interfaces were given the same address; a caller bug almost
    /// certainly, since the engine can never tell them apart otherwise.
    #[error("vpn_ip and default_ip must differ, both were {0}")]
    SameAddress(Ipv4Addr),
    /// A caller passed an interface index of zero, which Windows never assigns to a real
    /// adapter; this is rejected rather than silently stored, since it would otherwise fail
    /// much later and much less clearly, deep inside route programming or packet re-injection.
    #[error("interface index must be non-zero")]
    ZeroInterfaceIndex,
    /// A caller passed the unspecified address as a gateway.
    #[error("default_gateway must not be the unspecified address")]
    UnspecifiedGateway,
}
