// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::collections::HashSet;
use std::sync::Arc;

use config::Mode;
use left_right::{Absorb, ReadGuard, ReadHandle, WriteHandle};

/// The mutable half of an [`config::EngineConfig`] the outbound diverter's hot path reads: the
/// mode and the toggled-app set. Swapped together atomically so a single packet decision never
/// observes one updated and the other stale (§5, "`update_policy` and `update_mode` are observed
/// by C4 atomically; a single packet decision uses one consistent snapshot of both").
#[derive(Clone)]
pub struct PolicySnapshot {
    mode: Mode,
    toggled: HashSet<Arc<str>>,
}

impl PolicySnapshot {
    fn new(mode: Mode, toggled: HashSet<Arc<str>>) -> Self {
        Self { mode, toggled }
    }

    /// The current default-side mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// `true` if `normalized_exe_path` is in the toggled set.
    #[must_use]
    pub fn is_toggled(&self, normalized_exe_path: &str) -> bool {
        self.toggled.contains(normalized_exe_path)
    }
}

enum PolicyChange {
    SetMode(Mode),
    SetToggled(HashSet<Arc<str>>),
}

impl Absorb<PolicyChange> for PolicySnapshot {
    fn absorb_first(&mut self, change: &mut PolicyChange, _: &Self) {
        match change {
            PolicyChange::SetMode(mode) => self.mode = *mode,
            PolicyChange::SetToggled(toggled) => self.toggled = toggled.clone(),
        }
    }
    fn drop_first(self: Box<Self>) {}
    fn sync_with(&mut self, first: &Self) {
        *self = first.clone();
    }
}

/// Single-writer handle the supervisor uses to publish `update_mode`/`update_policy` calls.
pub struct PolicyWriter(WriteHandle<PolicySnapshot, PolicyChange>);

impl PolicyWriter {
    /// Create a writer/reader pair seeded with the engine's starting mode and toggled set.
    #[must_use]
    pub fn new(mode: Mode, toggled: HashSet<Arc<str>>) -> (PolicyWriter, PolicyReader) {
        let (w, r) = left_right::new_from_empty::<PolicySnapshot, PolicyChange>(
            PolicySnapshot::new(mode, toggled),
        );
        (PolicyWriter(w), PolicyReader(r))
    }

    /// Atomically replace the mode.
    pub fn set_mode(&mut self, mode: Mode) {
        self.0.append(PolicyChange::SetMode(mode));
        self.0.publish();
    }

    /// Atomically replace the toggled set.
    pub fn set_toggled(&mut self, toggled: HashSet<Arc<str>>) {
        self.0.append(PolicyChange::SetToggled(toggled));
        self.0.publish();
    }
}

/// Lock-free reader handle, cloned once per diverter thread that consults policy.
#[derive(Clone)]
pub struct PolicyReader(ReadHandle<PolicySnapshot>);

impl PolicyReader {
    /// Enter the currently-published snapshot. `None` only if the writer was dropped without
    /// ever publishing, which cannot happen here since [`PolicyWriter::new`] always seeds one.
    pub fn enter(&self) -> Option<ReadGuard<'_, PolicySnapshot>> {
        self.0.enter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reader_observes_mode_and_toggled_updates() {
        let (mut writer, reader) = PolicyWriter::new(Mode::VpnDefault, HashSet::new());
        assert_eq!(reader.enter().unwrap().mode(), Mode::VpnDefault);

        writer.set_mode(Mode::DirectDefault);
        assert_eq!(reader.enter().unwrap().mode(), Mode::DirectDefault);

        let mut toggled = HashSet::new();
        toggled.insert(Arc::from("C:\\APP\\BROWSER.EXE"));
        writer.set_toggled(toggled);
        assert!(reader.enter().unwrap().is_toggled("C:\\APP\\BROWSER.EXE"));
    }
}
