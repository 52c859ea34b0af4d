// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::net::{Ipv4Addr, SocketAddrV4};

use windows::Win32::Foundation::HRESULT;
use windows::Win32::NetworkManagement::IpHelper::{
    CreateIpForwardEntry2, DeleteIpForwardEntry2, InitializeIpForwardEntry, MIB_IPFORWARD_ROW2,
};
use windows::core::Error as WindowsError;

use net::IfIndex;

use crate::{RouteError, RouteTable, ROUTE_METRIC};

/// `HRESULT` a `CreateIpForwardEntry2` call returns when the identical route is already present.
const OBJECT_ALREADY_EXISTS: HRESULT = HRESULT::from_win32(0x1392);
/// `HRESULT` a `DeleteIpForwardEntry2` call returns when the route is already gone.
const NOT_FOUND: HRESULT = HRESULT::from_win32(0x0490);

fn build_row(prefix: Ipv4Addr, prefix_len: u8, gateway: Ipv4Addr, if_index: IfIndex) -> MIB_IPFORWARD_ROW2 {
    let mut row = MIB_IPFORWARD_ROW2::default();
    // SAFETY: `row` is a plain-old-data struct; this just fills in the library's documented
    // defaults (loopback flags, protocol, lifetimes) before the fields below override them.
    unsafe { InitializeIpForwardEntry(&mut row) };

    row.InterfaceIndex = if_index.as_u32();
    row.DestinationPrefix.PrefixLength = prefix_len;
    row.DestinationPrefix.Prefix.Ipv4 = SocketAddrV4::new(prefix, 0).into();
    row.NextHop.Ipv4 = SocketAddrV4::new(gateway, 0).into();
    row.Metric = ROUTE_METRIC;
    row
}

/// [`RouteTable`] backed by the Windows IP Helper API's `MIB_IPFORWARD_ROW2` route table.
#[derive(Debug, Default)]
pub struct WindowsRouteTable;

impl WindowsRouteTable {
    /// Build a new handle. Stateless: every call opens no persistent resource, matching the IP
    /// Helper API's own per-call semantics.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RouteTable for WindowsRouteTable {
    fn add_route(
        &self,
        prefix: Ipv4Addr,
        prefix_len: u8,
        gateway: Ipv4Addr,
        if_index: IfIndex,
    ) -> Result<(), RouteError> {
        let row = build_row(prefix, prefix_len, gateway, if_index);
        // SAFETY: `row` was fully initialized by `build_row` above.
        let result: Result<(), WindowsError> = unsafe { CreateIpForwardEntry2(&row) }.ok();
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.code() == OBJECT_ALREADY_EXISTS => Ok(()),
            Err(err) => Err(RouteError::AddFailed {
                prefix,
                prefix_len,
                if_index,
                detail: err.to_string(),
            }),
        }
    }

    fn remove_route(
        &self,
        prefix: Ipv4Addr,
        prefix_len: u8,
        gateway: Ipv4Addr,
        if_index: IfIndex,
    ) -> Result<(), RouteError> {
        let row = build_row(prefix, prefix_len, gateway, if_index);
        // SAFETY: `row` was fully initialized by `build_row` above.
        let result: Result<(), WindowsError> = unsafe { DeleteIpForwardEntry2(&row) }.ok();
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.code() == NOT_FOUND => Ok(()),
            Err(err) => Err(RouteError::RemoveFailed {
                prefix,
                prefix_len,
                if_index,
                detail: err.to_string(),
            }),
        }
    }
}
