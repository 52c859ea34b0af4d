// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use net::Port;

/// One poll cycle's indexes: the outbound diverter's two-level lookup from a local endpoint (or
/// bare port) to the owning executable's normalized path.
///
/// Cheaply `Clone`able (an `Arc<str>` per entry, two `HashMap`s) because a full new instance is
/// built every poll cycle and handed to [`crate::FlowTableWriter::replace`] wholesale rather than
/// mutated in place — see that type for why.
#[derive(Clone, Default)]
pub struct FlowTables {
    by_endpoint: HashMap<(Ipv4Addr, Port), Arc<str>>,
    by_port: HashMap<Port, Arc<str>>,
}

impl FlowTables {
    /// An empty snapshot, the tracker's starting point before its first cycle completes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_endpoint(&mut self, ip: Ipv4Addr, port: Port, exe: Arc<str>) {
        self.by_endpoint.insert((ip, port), exe);
    }

    pub(crate) fn insert_port(&mut self, port: Port, exe: Arc<str>) {
        self.by_port.entry(port).or_insert(exe);
    }

    /// Look up `(local_ip, local_port)`, the outbound diverter's first and fastest check.
    #[must_use]
    pub fn lookup_endpoint(&self, ip: Ipv4Addr, port: Port) -> Option<Arc<str>> {
        self.by_endpoint.get(&(ip, port)).cloned()
    }

    /// Look up `local_port` alone, the fallback for peer-specific binds the endpoint index
    /// misses.
    #[must_use]
    pub fn lookup_port(&self, port: Port) -> Option<Arc<str>> {
        self.by_port.get(&port).cloned()
    }

    /// Number of distinct `(ip, port)` endpoint entries. Exposed for tests and diagnostics.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.by_endpoint.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn endpoint_lookup_misses_when_not_present() {
        let tables = FlowTables::new();
        assert_eq!(tables.lookup_endpoint(Ipv4Addr::new(10, 0, 0, 5), Port::new(1).unwrap()), None);
    }

    #[test]
    fn by_port_keeps_first_writer_on_collision() {
        let mut tables = FlowTables::new();
        let port = Port::new(5000).unwrap();
        tables.insert_port(port, Arc::from("first.exe"));
        tables.insert_port(port, Arc::from("second.exe"));
        assert_eq!(tables.lookup_port(port).as_deref(), Some("first.exe"));
    }
}
