// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use left_right::{Absorb, ReadGuard, ReadHandle, WriteHandle};

use crate::tables::FlowTables;

impl Absorb<FlowTablesChange> for FlowTables {
    fn absorb_first(&mut self, change: &mut FlowTablesChange, _: &Self) {
        match change {
            FlowTablesChange::Replace(tables) => *self = tables.clone(),
        }
    }
    fn drop_first(self: Box<Self>) {}
    fn sync_with(&mut self, first: &Self) {
        *self = first.clone();
    }
}

enum FlowTablesChange {
    Replace(FlowTables),
}

/// Single-writer handle the tracker uses to publish a whole new [`FlowTables`] snapshot each
/// poll cycle.
///
/// Every cycle builds an entirely new pair of indexes rather than mutating the published one in
/// place (§9, "Atomic table swap vs locked map"): the outbound diverter's hot-path reads must
/// never observe a half-updated table, and `left_right`'s publish step is exactly the
/// no-lock swap that guarantees that.
pub struct FlowTableWriter(WriteHandle<FlowTables, FlowTablesChange>);

impl FlowTableWriter {
    /// Create a fresh, empty writer/reader pair.
    #[must_use]
    pub fn new() -> (FlowTableWriter, FlowTableReader) {
        let (w, r) = left_right::new_from_empty::<FlowTables, FlowTablesChange>(FlowTables::new());
        (FlowTableWriter(w), FlowTableReader(r))
    }

    /// Replace the published tables with `tables` and publish immediately.
    pub fn replace(&mut self, tables: FlowTables) {
        self.0.append(FlowTablesChange::Replace(tables));
        self.0.publish();
    }
}

/// Lock-free reader handle, cloned once per consuming thread (here, the outbound diverter).
#[derive(Clone)]
pub struct FlowTableReader(ReadHandle<FlowTables>);

impl FlowTableReader {
    /// Enter the currently-published snapshot. Returns `None` only if the writer has been
    /// dropped without ever publishing, which does not happen once the tracker has completed its
    /// first cycle.
    pub fn enter(&self) -> Option<ReadGuard<'_, FlowTables>> {
        self.0.enter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use net::Port;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    #[test]
    fn reader_observes_published_replacement() {
        let (mut writer, reader) = FlowTableWriter::new();
        assert_eq!(reader.enter().unwrap().endpoint_count(), 0);

        let mut tables = FlowTables::new();
        tables.insert_endpoint(Ipv4Addr::new(10, 0, 0, 5), Port::new(1).unwrap(), Arc::from("a.exe"));
        writer.replace(tables);

        assert_eq!(reader.enter().unwrap().endpoint_count(), 1);
    }
}
