// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use nat::NatTable;
use portresolve::Pid;

use crate::enumerate::SocketEnumerator;
use crate::pid_cache::PidExeCache;
use crate::tables::FlowTables;
use crate::writer::FlowTableWriter;

/// How often the tracker re-snapshots the host's sockets. §5's timeout table.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);
/// The tracker asks the NAT table to prune itself every this many cycles (~10s at
/// [`POLL_INTERVAL`]), per §4.5 "NAT lifetime".
pub const NAT_PRUNE_EVERY_CYCLES: u32 = 50;
/// The NAT table's soft capacity; see [`nat::NatTable::prune`].
pub const NAT_MAX_ENTRIES: usize = 50_000;

/// The background worker behind component C2: repeatedly snapshots host sockets, rebuilds
/// [`FlowTables`], and periodically triggers NAT table pruning.
pub struct FlowTracker {
    enumerator: Box<dyn SocketEnumerator>,
    writer: FlowTableWriter,
    nat: Arc<NatTable>,
    vpn_ip: Ipv4Addr,
    default_ip: Ipv4Addr,
    pid_cache: PidExeCache,
    cycle: u32,
}

impl FlowTracker {
    /// Build a tracker. `vpn_ip`/`default_ip` are used to fan a wildcard bind out to both
    /// concrete addresses (§4.2, "Wildcard handling").
    #[must_use]
    pub fn new(
        enumerator: Box<dyn SocketEnumerator>,
        writer: FlowTableWriter,
        nat: Arc<NatTable>,
        vpn_ip: Ipv4Addr,
        default_ip: Ipv4Addr,
    ) -> Self {
        Self {
            enumerator,
            writer,
            nat,
            vpn_ip,
            default_ip,
            pid_cache: PidExeCache::new(),
            cycle: 0,
        }
    }

    /// Spawn the tracker on a dedicated OS thread. Returns the join handle and a sender the
    /// caller uses to request a clean stop.
    ///
    /// The thread is not marked `daemon` (Rust has no such concept natively), but the supervisor
    /// never relies on process exit to reclaim it: `stop()` plus a bounded join is the only
    /// shutdown path (§5, "Cancellation").
    #[must_use]
    pub fn spawn(mut self) -> (std::thread::JoinHandle<()>, Sender<()>) {
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("divert-flowtrack".to_string())
            .spawn(move || self.run(&stop_rx))
            .expect("failed to spawn flow tracker thread");
        (handle, stop_tx)
    }

    fn run(&mut self, stop_rx: &Receiver<()>) {
        loop {
            match stop_rx.recv_timeout(POLL_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => self.run_cycle(),
            }
        }
    }

    fn run_cycle(&mut self) {
        let tcp = match self.enumerator.enumerate_tcp() {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(%err, "TCP socket enumeration failed, skipping cycle");
                return;
            }
        };
        let udp = match self.enumerator.enumerate_udp() {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(%err, "UDP socket enumeration failed, skipping cycle");
                return;
            }
        };

        let mut tables = FlowTables::new();
        let mut live_pids = HashSet::new();

        for row in tcp.into_iter().chain(udp) {
            live_pids.insert(row.pid);
            let Some(exe) =
                self.pid_cache.resolve(row.pid, portresolve::resolve_executable_path)
            else {
                continue;
            };

            if row.local_ip.is_unspecified() {
                tables.insert_endpoint(self.vpn_ip, row.local_port, Arc::clone(&exe));
                tables.insert_endpoint(self.default_ip, row.local_port, Arc::clone(&exe));
            } else {
                tables.insert_endpoint(row.local_ip, row.local_port, Arc::clone(&exe));
            }
            tables.insert_port(row.local_port, exe);
        }

        self.pid_cache.compact(&live_pids);
        self.writer.replace(tables);

        self.cycle = self.cycle.wrapping_add(1);
        if self.cycle % NAT_PRUNE_EVERY_CYCLES == 0 {
            self.nat.prune(NAT_MAX_ENTRIES);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::SocketRow;
    use crate::writer::FlowTableReader;
    use net::Port;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct FakeEnumerator {
        tcp: Vec<SocketRow>,
        udp: Vec<SocketRow>,
    }

    impl SocketEnumerator for FakeEnumerator {
        fn enumerate_tcp(&mut self) -> Result<Vec<SocketRow>, crate::error::EnumerationError> {
            Ok(self.tcp.clone())
        }
        fn enumerate_udp(&mut self) -> Result<Vec<SocketRow>, crate::error::EnumerationError> {
            Ok(self.udp.clone())
        }
    }

    fn build(tcp: Vec<SocketRow>) -> (FlowTracker, FlowTableReader) {
        let (writer, reader) = FlowTableWriter::new();
        let enumerator = Box::new(FakeEnumerator { tcp, udp: vec![] });
        let tracker = FlowTracker::new(
            enumerator,
            writer,
            Arc::new(NatTable::new()),
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(192, 168, 1, 20),
        );
        (tracker, reader)
    }

    #[test]
    fn wildcard_bind_is_indexed_under_both_addresses() {
        let port = Port::new(5000).unwrap();
        static RESOLVE_CALLS: Mutex<u32> = Mutex::new(0);
        let mut tracker_pid_cache = PidExeCache::new();
        let _ = tracker_pid_cache.resolve(Pid::new(1), |_| {
            *RESOLVE_CALLS.lock().unwrap() += 1;
            Some(r"C:\app\server.exe".to_string())
        });

        let (mut tracker, reader) = build(vec![SocketRow {
            local_ip: Ipv4Addr::UNSPECIFIED,
            local_port: port,
            pid: Pid::new(1),
        }]);
        // Swap in a cache that already resolves PID 1, simulating a warm cache; the tracker's
        // own `resolve_executable_path` call would fail for a fabricated PID in a test process.
        tracker.pid_cache = tracker_pid_cache;
        tracker.run_cycle();

        let tables = reader.enter().unwrap();
        assert!(tables.lookup_endpoint(Ipv4Addr::new(10, 0, 0, 5), port).is_some());
        assert!(tables.lookup_endpoint(Ipv4Addr::new(192, 168, 1, 20), port).is_some());
    }

    #[test]
    fn nat_prune_fires_every_fiftieth_cycle() {
        let (mut tracker, _reader) = build(vec![]);
        let nat = Arc::clone(&tracker.nat);
        for port in 1..=(NAT_MAX_ENTRIES as u16 + 1) {
            nat.insert(
                nat::NatKey::new(Ipv4Addr::new(8, 8, 8, 8), Port::new(443).unwrap(), Port::new(port).unwrap()),
                Ipv4Addr::new(10, 0, 0, 5),
                None,
                0,
            );
        }
        assert!(nat.len() > NAT_MAX_ENTRIES);

        for _ in 0..NAT_PRUNE_EVERY_CYCLES {
            tracker.run_cycle();
        }

        assert!(nat.len() <= NAT_MAX_ENTRIES);
    }
}
