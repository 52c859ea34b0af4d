// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use config::normalize_executable_path;
use portresolve::Pid;

/// A per-cycle cache of already-resolved `pid → normalized_exe_path`, owned solely by the
/// tracker and never touched by the outbound or inbound diverters directly (§5, "`pid_to_exe`:
/// owned by C2; never accessed by C4/C5").
///
/// Resolution itself (opening the process, reading its image path) is comparatively expensive;
/// caching means a long-lived process's path is looked up once, not every 200 ms for the
/// lifetime of its sockets.
#[derive(Default)]
pub struct PidExeCache {
    entries: HashMap<Pid, Arc<str>>,
}

impl PidExeCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `pid` to its normalized executable path, consulting the cache first and calling
    /// `resolve` (expected to be [`portresolve::resolve_executable_path`]) only on a miss.
    ///
    /// Returns `None`, and does not cache anything, if `resolve` cannot yet answer for this PID
    /// (a dead or access-protected process) — per §4.2, "Non-resolvable paths ... are skipped
    /// for this cycle; the socket is still tracked if a subsequent cycle resolves it."
    pub fn resolve(
        &mut self,
        pid: Pid,
        resolve: impl FnOnce(Pid) -> Option<String>,
    ) -> Option<Arc<str>> {
        if let Some(exe) = self.entries.get(&pid) {
            return Some(Arc::clone(exe));
        }
        let raw = resolve(pid)?;
        let normalized: Arc<str> = Arc::from(normalize_executable_path(&raw));
        self.entries.insert(pid, Arc::clone(&normalized));
        Some(normalized)
    }

    /// Retain only the PIDs present in `live`, the set of PIDs seen in the snapshot just taken
    /// (§3-I2, "`pid_to_exe` never contains a dead PID after a completed tracker cycle").
    pub fn compact(&mut self, live: &HashSet<Pid>) {
        self.entries.retain(|pid, _| live.contains(pid));
    }

    /// Number of cached PIDs. Exposed for tests and diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_and_caches() {
        let mut cache = PidExeCache::new();
        let mut calls = 0;
        let pid = Pid::new(100);

        let first = cache.resolve(pid, |_| {
            calls += 1;
            Some(r"C:\app\browser.exe".to_string())
        });
        assert_eq!(first.as_deref(), Some(r"C:\APP\BROWSER.EXE"));

        let second = cache.resolve(pid, |_| {
            calls += 1;
            Some(r"C:\app\browser.exe".to_string())
        });
        assert_eq!(second.as_deref(), Some(r"C:\APP\BROWSER.EXE"));
        assert_eq!(calls, 1, "second resolve must hit the cache, not call resolve again");
    }

    #[test]
    fn unresolvable_pid_is_not_cached() {
        let mut cache = PidExeCache::new();
        let pid = Pid::new(999);
        assert_eq!(cache.resolve(pid, |_| None), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn compact_drops_dead_pids() {
        let mut cache = PidExeCache::new();
        let alive = Pid::new(1);
        let dead = Pid::new(2);
        cache.resolve(alive, |_| Some("a.exe".to_string()));
        cache.resolve(dead, |_| Some("b.exe".to_string()));

        let mut live = HashSet::new();
        live.insert(alive);
        cache.compact(&live);

        assert_eq!(cache.len(), 1);
    }
}
