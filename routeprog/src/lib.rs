// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Installs and removes the two `/1` host routes that give a redirected packet a forwarding
//! path out the physical default interface, without ever outranking the VPN's own default
//! route.
//!
//! See [`InstalledRoutes`] for why this is modeled as an owned, droppable guard rather than a
//! pair of free functions.

#![deny(clippy::all)]

mod error;
mod guard;
mod windows_route_table;

pub use error::RouteError;
pub use guard::InstalledRoutes;
pub use windows_route_table::WindowsRouteTable;

use net::IfIndex;
use std::net::Ipv4Addr;

/// Metric applied to both halves of the split-default route. High enough that the OS prefers
/// the VPN's own, lower-metric default route for anything not explicitly redirected; see
/// [`guard`] for why two `/1`s are installed instead of one `/0`.
pub const ROUTE_METRIC: u32 = 9999;

/// The two prefixes that together cover the entire unicast IPv4 address space without ever
/// being the literal `0.0.0.0/0` the VPN's own default route already occupies.
pub const SPLIT_DEFAULT_PREFIXES: [(Ipv4Addr, u8); 2] =
    [(Ipv4Addr::new(0, 0, 0, 0), 1), (Ipv4Addr::new(128, 0, 0, 0), 1)];

/// What [`InstalledRoutes`] needs from the OS route table: add/remove one prefix at a time,
/// idempotently.
pub trait RouteTable: Send + Sync {
    /// Add `prefix/prefix_len` via `gateway` on `if_index` at [`ROUTE_METRIC`].
    ///
    /// Idempotent: a route that already exists with these parameters is treated as success.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::AddFailed`] if the OS rejects the route for any other reason.
    fn add_route(
        &self,
        prefix: Ipv4Addr,
        prefix_len: u8,
        gateway: Ipv4Addr,
        if_index: IfIndex,
    ) -> Result<(), RouteError>;

    /// Remove `prefix/prefix_len` via `gateway` on `if_index`.
    ///
    /// Idempotent: a route that is already gone is treated as success.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::RemoveFailed`] if the OS rejects the removal for any other reason.
    fn remove_route(
        &self,
        prefix: Ipv4Addr,
        prefix_len: u8,
        gateway: Ipv4Addr,
        if_index: IfIndex,
    ) -> Result<(), RouteError>;
}
