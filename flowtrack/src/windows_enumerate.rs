// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::ffi::c_void;
use std::net::Ipv4Addr;

use windows::Win32::Foundation::BOOL;
use windows::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, GetExtendedUdpTable, MIB_TCPTABLE_OWNER_PID, MIB_UDPTABLE_OWNER_PID,
    TCP_TABLE_OWNER_PID_ALL, UDP_TABLE_OWNER_PID,
};
use windows::Win32::Networking::WinSock::AF_INET;

use net::Port;
use portresolve::{GrowBuffer, Pid, classify};

use crate::enumerate::{SocketEnumerator, SocketRow};
use crate::error::EnumerationError;

/// A starting buffer size comfortably large enough for a desktop host's connection table
/// without needing a grow-and-retry round trip on the common path. Mirrors
/// `portresolve::WindowsPortResolver`'s sizing; this enumerator pulls the *whole* table every
/// cycle rather than one row, so it reuses the same buffer-growth discipline rather than a
/// fresh one.
const INITIAL_BUFFER_CAPACITY: usize = 32 * 1024;

fn ntohs(raw: u32) -> u16 {
    (raw as u16).swap_bytes()
}

fn ipv4_from_raw(raw: u32) -> Ipv4Addr {
    Ipv4Addr::from(raw.to_ne_bytes())
}

/// [`SocketEnumerator`] backed by `GetExtendedTcpTable` / `GetExtendedUdpTable`.
pub struct WindowsSocketEnumerator {
    tcp_buffer: GrowBuffer,
    udp_buffer: GrowBuffer,
}

impl Default for WindowsSocketEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowsSocketEnumerator {
    /// Create an enumerator with fresh, empty buffers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tcp_buffer: GrowBuffer::new(INITIAL_BUFFER_CAPACITY),
            udp_buffer: GrowBuffer::new(INITIAL_BUFFER_CAPACITY),
        }
    }
}

impl SocketEnumerator for WindowsSocketEnumerator {
    fn enumerate_tcp(&mut self) -> Result<Vec<SocketRow>, EnumerationError> {
        let table_bytes = self
            .tcp_buffer
            .query(|bytes| {
                let mut size = bytes.len() as u32;
                // SAFETY: `bytes` is valid for `size` bytes for the duration of this call; the
                // API writes at most `size` bytes back and updates `size` to the bytes used (on
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
            })
            .ok_or_else(|| EnumerationError::Tcp("GetExtendedTcpTable failed".to_string()))?;

        // SAFETY: `table_bytes` was just populated by a successful `GetExtendedTcpTable` call
        // into a buffer laid out as `MIB_TCPTABLE_OWNER_PID`, and `dwNumEntries` never exceeds
        // the number of rows the OS actually wrote.
        let rows = unsafe {
            let table = &*table_bytes.as_ptr().cast::<MIB_TCPTABLE_OWNER_PID>();
            std::slice::from_raw_parts(table.table.as_ptr(), table.dwNumEntries as usize)
                .iter()
                .filter(|row| row.dwOwningPid != 0)
                .filter_map(|row| {
                    Port::new(ntohs(row.dwLocalPort)).ok().map(|port| SocketRow {
                        local_ip: ipv4_from_raw(row.dwLocalAddr),
                        local_port: port,
                        pid: Pid::new(row.dwOwningPid),
                    })
                })
                .collect::<Vec<_>>()
        };
        Ok(rows)
    }

    fn enumerate_udp(&mut self) -> Result<Vec<SocketRow>, EnumerationError> {
        let table_bytes = self
            .udp_buffer
            .query(|bytes| {
                let mut size = bytes.len() as u32;
                // SAFETY: see `enumerate_tcp`.
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
            })
            .ok_or_else(|| EnumerationError::Udp("GetExtendedUdpTable failed".to_string()))?;

        // SAFETY: see `enumerate_tcp`.
        let rows = unsafe {
            let table = &*table_bytes.as_ptr().cast::<MIB_UDPTABLE_OWNER_PID>();
            std::slice::from_raw_parts(table.table.as_ptr(), table.dwNumEntries as usize)
                .iter()
                .filter(|row| row.dwOwningPid != 0)
                .filter_map(|row| {
                    Port::new(ntohs(row.dwLocalPort)).ok().map(|port| SocketRow {
                        local_ip: ipv4_from_raw(row.dwLocalAddr),
                        local_port: port,
                        pid: Pid::new(row.dwOwningPid),
                    })
                })
                .collect::<Vec<_>>()
        };
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ntohs_swaps_byte_order() {
        assert_eq!(ntohs(0x0000_BB01), 443);
    }

    #[test]
    fn ipv4_from_raw_reads_native_byte_order() {
        // The IP Helper API reports addresses as a DWORD in network byte order held in the
        // platform's native integer representation, i.e. byte `[10, 0, 0, 5]` regardless of
        // host endianness once read with `to_ne_bytes`.
        let raw = u32::from_ne_bytes([10, 0, 0, 5]);
        assert_eq!(ipv4_from_raw(raw), Ipv4Addr::new(10, 0, 0, 5));
    }
}
