// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

/// Failures from adding or removing a route.
///
/// These never propagate out of the engine supervisor: §7's error policy treats route
/// programming as best-effort, logged and swallowed by the caller ([`crate::InstalledRoutes`]).
#[derive(Debug, Error)]
pub enum RouteError {
    /// The OS rejected the route add for a reason other than "it already exists".
    #[error("failed to add route for {prefix}/{prefix_len} via if {if_index}: {detail}")]
    AddFailed {
        /// The destination prefix that failed to install.
        prefix: std::net::Ipv4Addr,
        /// The prefix length of the failed route.
        prefix_len: u8,
        /// The interface the route would have used.
        if_index: net::IfIndex,
        /// The OS-provided failure detail.
        detail: String,
    },
    /// The OS rejected the route removal for a reason other than "it is already gone".
    #[error("failed to remove route for {prefix}/{prefix_len} via if {if_index}: {detail}")]
    RemoveFailed {
        /// The destination prefix that failed to remove.
        prefix: std::net::Ipv4Addr,
        /// The prefix length of the failed route.
        prefix_len: u8,
        /// The interface the route would have used.
        if_index: net::IfIndex,
        /// The OS-provided failure detail.
        detail: String,
    },
}
