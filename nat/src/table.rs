// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use dashmap::DashMap;
use net::{IfIndex, Port};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};

/// The key under which a NAT mapping is stored: the packet's remote endpoint plus the local
/// port it was (or will be) seen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NatKey {
    /// The remote peer's IPv4 address.
    pub remote_ip: Ipv4Addr,
    /// The remote peer's port.
    pub remote_port: Port,
    /// The local port of the flow, unaffected by the source-address rewrite.
    pub local_port: Port,
}

impl NatKey {
    /// Build a [`NatKey`] from its parts.
    #[must_use]
    pub fn new(remote_ip: Ipv4Addr, remote_port: Port, local_port: Port) -> Self {
        Self { remote_ip, remote_port, local_port }
    }
}

/// What the inbound diverter needs to restore on a matching reply: the address the packet
/// should have been delivered to, and the interface it originally arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NatEntryInner {
    original_local_ip: Ipv4Addr,
    original_if_index: Option<IfIndex>,
    /// Monotonically increasing insertion/refresh order, used to approximate LRU eviction
    /// (see [`NatTable::prune`]). This is explicitly an approximation, not a real least-recently
    /// used ordering: it is the order entries were last *touched*, and touching happens on every
    /// packet of a flow, so active flows naturally stay young.
    sequence: u64,
    packets: u64,
    bytes: u64,
}

/// A snapshot of one NAT entry's restore target and usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NatEntry {
    /// The address the inbound diverter should rewrite `dst_addr` to.
    pub original_local_ip: Ipv4Addr,
    /// The interface the inbound diverter should redeliver the packet on, if known.
    pub original_if_index: Option<IfIndex>,
    /// Total packets seen under this key, both directions.
    pub packets: u64,
    /// Total bytes seen under this key, both directions.
    pub bytes: u64,
}

/// The concurrent NAT table shared between the outbound diverter (writer) and the inbound
/// diverter (reader).
///
/// Backed by a [`DashMap`] rather than a single mutex-guarded `HashMap`: both diverters run on
/// their own thread and the outbound insert must never block behind an inbound lookup sharing
/// the same shard of the table.
pub struct NatTable {
    entries: DashMap<NatKey, NatEntryInner>,
    next_sequence: AtomicU64,
}

impl Default for NatTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NatTable {
    /// Create an empty NAT table.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: DashMap::new(), next_sequence: AtomicU64::new(0) }
    }

    fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Record (or refresh) the mapping for `key`, and account `packet_len` bytes of outbound
    /// traffic against it.
    ///
    /// Refreshing rather than rejecting a re-insert under the same key is deliberate: every
    /// rewritten packet of a long-lived flow calls this, not just the first one, and the
    /// refreshed sequence number is what keeps an active flow from being pruned as if it were
    /// idle (§ [`NatTable::prune`]).
    ///
    /// Must be called and visible to the inbound diverter before the corresponding rewritten
    /// packet is re-injected, so that a reply arriving immediately afterwards can be matched.
    pub fn insert(
        &self,
        key: NatKey,
        original_local_ip: Ipv4Addr,
        original_if_index: Option<IfIndex>,
        packet_len: u64,
    ) {
        let sequence = self.next_sequence();
        self.entries
            .entry(key)
            .and_modify(|entry| {
                entry.sequence = sequence;
                entry.packets += 1;
                entry.bytes += packet_len;
            })
            .or_insert(NatEntryInner {
                original_local_ip,
                original_if_index,
                sequence,
                packets: 1,
                bytes: packet_len,
            });
    }

    /// Look up `key`, accounting `packet_len` bytes of inbound traffic against it if found, and
    /// refreshing its sequence number so an actively-replying flow is not pruned.
    #[must_use]
    pub fn lookup(&self, key: &NatKey, packet_len: u64) -> Option<NatEntry> {
        let mut entry = self.entries.get_mut(key)?;
        entry.sequence = self.next_sequence();
        entry.packets += 1;
        entry.bytes += packet_len;
        Some(NatEntry {
            original_local_ip: entry.original_local_ip,
            original_if_index: entry.original_if_index,
            packets: entry.packets,
            bytes: entry.bytes,
        })
    }

    /// Remove all entries, regardless of freshness. Used on engine `stop()`.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// If the table holds more than `max` entries, evict the oldest half (by insertion/refresh
    /// sequence) so it holds at most `max / 2` afterwards.
    ///
    /// This is the bulk eviction the flow tracker triggers every 50 poll cycles rather than
    /// maintaining a per-packet timestamp, which would be far more expensive at typical desktop
    /// packet rates. See [`NatEntryInner::sequence`] for the caveat that this is an approximate,
    /// not exact, least-recently-used order.
    pub fn prune(&self, max: usize) {
        if self.entries.len() <= max {
            return;
        }

        let mut sequences: Vec<u64> =
            self.entries.iter().map(|entry| entry.sequence).collect();
        sequences.sort_unstable();
        let cutoff = sequences[sequences.len() / 2];

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.sequence >= cutoff);
        tracing::debug!(
            before,
            after = self.entries.len(),
            max,
            "pruned NAT table"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(remote_port: u16, local_port: u16) -> NatKey {
        NatKey::new(
            Ipv4Addr::new(8, 8, 8, 8),
            Port::new(remote_port).unwrap(),
            Port::new(local_port).unwrap(),
        )
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let table = NatTable::new();
        let original_ip = Ipv4Addr::new(10, 0, 0, 5);
        table.insert(key(443, 44000), original_ip, Some(IfIndex::new(7)), 100);

        let entry = table.lookup(&key(443, 44000), 200).unwrap();
        assert_eq!(entry.original_local_ip, original_ip);
        assert_eq!(entry.original_if_index, Some(IfIndex::new(7)));
        assert_eq!(entry.packets, 2);
        assert_eq!(entry.bytes, 300);
    }

    #[test]
    fn lookup_miss_returns_none() {
        let table = NatTable::new();
        assert!(table.lookup(&key(443, 44000), 100).is_none());
    }

    #[test]
    fn reinserting_same_key_refreshes_rather_than_duplicates() {
        let table = NatTable::new();
        let original_ip = Ipv4Addr::new(10, 0, 0, 5);
        table.insert(key(443, 44000), original_ip, None, 100);
        table.insert(key(443, 44000), original_ip, None, 50);

        assert_eq!(table.len(), 1);
        let entry = table.lookup(&key(443, 44000), 0).unwrap();
        assert_eq!(entry.packets, 3);
        assert_eq!(entry.bytes, 150);
    }

    #[test]
    fn prune_is_a_no_op_under_the_limit() {
        let table = NatTable::new();
        for port in 1..=10u16 {
            table.insert(key(443, port), Ipv4Addr::new(10, 0, 0, 1), None, 0);
        }
        table.prune(50_000);
        assert_eq!(table.len(), 10);
    }

    #[test]
    fn prune_evicts_the_older_half() {
        let table = NatTable::new();
        for port in 1..=100u16 {
            table.insert(key(443, port), Ipv4Addr::new(10, 0, 0, 1), None, 0);
        }
        table.prune(50);
        assert!(table.len() <= 50);
        // The most recently inserted key must survive the prune.
        assert!(table.lookup(&key(443, 100), 0).is_some());
    }
}
