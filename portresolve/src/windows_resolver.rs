// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::ffi::c_void;

use net::Port;
use parking_lot::Mutex;
use windows::Win32::Foundation::BOOL;
use windows::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, GetExtendedUdpTable, MIB_TCPTABLE_OWNER_PID, MIB_UDPTABLE_OWNER_PID,
    TCP_TABLE_OWNER_PID_ALL, UDP_TABLE_OWNER_PID,
};
use windows::Win32::Networking::WinSock::AF_INET;

use crate::buffer::{GrowBuffer, classify};
use crate::pid::Pid;
use crate::resolver::PortResolver;

/// A starting buffer size comfortably large enough for a desktop host's connection table
/// without needing a grow-and-retry round trip on the common path.
const INITIAL_BUFFER_CAPACITY: usize = 32 * 1024;

/// Byte-swap the low 16 bits of a `DWORD` port field, which the IP Helper API reports in
/// network byte order regardless of host endianness.
fn ntohs(raw: u32) -> u16 {
    (raw as u16).swap_bytes()
}

/// [`PortResolver`] backed by `GetExtendedTcpTable` / `GetExtendedUdpTable`.
pub struct WindowsPortResolver {
    tcp_buffer: Mutex<GrowBuffer>,
    udp_buffer: Mutex<GrowBuffer>,
}

impl Default for WindowsPortResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowsPortResolver {
    /// Create a resolver with fresh, empty buffers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tcp_buffer: Mutex::new(GrowBuffer::new(INITIAL_BUFFER_CAPACITY)),
            udp_buffer: Mutex::new(GrowBuffer::new(INITIAL_BUFFER_CAPACITY)),
        }
    }

    fn resolve_tcp(&self, port: Port) -> Option<Pid> {
        let target = port.as_u16();
        let mut buffer = self.tcp_buffer.lock();
        let Some(table_bytes) = buffer.query(|bytes| {
            let mut size = bytes.len() as u32;
            // SAFETY: `bytes` is valid for `size` bytes for the duration of this call; the API
            // writes at most `size` bytes back into it and updates `size` to the bytes used (on
            // success) or required (on `ERROR_INSUFFICIENT_BUFFER`).
            let ret = unsafe {
                GetExtendedTcpTable(
                    Some(bytes.as_mut_ptr().cast::<c_void>()),
                    &mut size,
                    BOOL(0),
                    u32::from(AF_INET.0),
                    TCP_TABLE_OWNER_PID_ALL,
                    0,
                )
            };
            classify(ret, size)
        }) else {
            tracing::debug!(port = target, "GetExtendedTcpTable query gave up, treating as a miss");
            return None;
        };

        // SAFETY: `table_bytes` was just populated by a successful `GetExtendedTcpTable` call
        // into a buffer laid out as `MIB_TCPTABLE_OWNER_PID`, and `dwNumEntries` never exceeds
        // the number of rows the OS actually wrote.
        unsafe {
            let table = &*table_bytes.as_ptr().cast::<MIB_TCPTABLE_OWNER_PID>();
            let rows =
                std::slice::from_raw_parts(table.table.as_ptr(), table.dwNumEntries as usize);
            rows.iter()
                .find(|row| ntohs(row.dwLocalPort) == target && row.dwOwningPid != 0)
                .map(|row| Pid::new(row.dwOwningPid))
        }
    }

    fn resolve_udp(&self, port: Port) -> Option<Pid> {
        let target = port.as_u16();
        let mut buffer = self.udp_buffer.lock();
        let Some(table_bytes) = buffer.query(|bytes| {
            let mut size = bytes.len() as u32;
            // SAFETY: see `resolve_tcp`.
            let ret = unsafe {
                GetExtendedUdpTable(
                    Some(bytes.as_mut_ptr().cast::<c_void>()),
                    &mut size,
                    BOOL(0),
                    u32::from(AF_INET.0),
                    UDP_TABLE_OWNER_PID,
                    0,
                )
            };
            classify(ret, size)
        }) else {
            tracing::debug!(port = target, "GetExtendedUdpTable query gave up, treating as a miss");
            return None;
        };

        // SAFETY: see `resolve_tcp`.
        unsafe {
            let table = &*table_bytes.as_ptr().cast::<MIB_UDPTABLE_OWNER_PID>();
            let rows =
                std::slice::from_raw_parts(table.table.as_ptr(), table.dwNumEntries as usize);
            rows.iter()
                .find(|row| ntohs(row.dwLocalPort) == target && row.dwOwningPid != 0)
                .map(|row| Pid::new(row.dwOwningPid))
        }
    }
}

impl PortResolver for WindowsPortResolver {
    fn resolve(&self, port: Port) -> Option<Pid> {
        self.resolve_tcp(port).or_else(|| self.resolve_udp(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ntohs_swaps_byte_order() {
        // 0x01BB is port 443 in network byte order occupying the low 16 bits.
        assert_eq!(ntohs(0x0000_BB01), 443);
    }
}
