// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::net::Ipv4Addr;
use std::sync::Arc;

use net::IfIndex;

use crate::{RouteTable, SPLIT_DEFAULT_PREFIXES};

/// The pair of `/1` routes covering the unicast address space, installed on construction and
/// removed on drop.
///
/// Modeled as an owned guard, not a pair of free functions, so that releasing the routes is
/// something the type system can hold the supervisor to: `start` constructs one, `stop` drops
/// it, and there is no code path that forgets to call `remove` (§9, "Route programming as owned
/// resource"). Best-effort throughout: install failures are logged at warning and do not stop
/// construction from succeeding, per §4.3's error policy ("the engine starts and stops
/// successfully even if route programming fails").
pub struct InstalledRoutes {
    table: Arc<dyn RouteTable>,
    gateway: Ipv4Addr,
    if_index: IfIndex,
}

impl InstalledRoutes {
    /// Install both split-default routes via `gateway` on `if_index`.
    ///
    /// Never fails: a per-route add failure is logged at warning and the other route is still
    /// attempted.
    #[must_use]
    pub fn install(table: Arc<dyn RouteTable>, gateway: Ipv4Addr, if_index: IfIndex) -> Self {
        for (prefix, prefix_len) in SPLIT_DEFAULT_PREFIXES {
            if let Err(err) = table.add_route(prefix, prefix_len, gateway, if_index) {
                tracing::warn!(%prefix, prefix_len, %gateway, %if_index, %err, "failed to install split-default route");
            }
        }
        Self { table, gateway, if_index }
    }
}

impl Drop for InstalledRoutes {
    fn drop(&mut self) {
        for (prefix, prefix_len) in SPLIT_DEFAULT_PREFIXES {
            if let Err(err) =
                self.table.remove_route(prefix, prefix_len, self.gateway, self.if_index)
            {
                tracing::debug!(%prefix, prefix_len, gateway = %self.gateway, if_index = %self.if_index, %err, "failed to remove split-default route");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteError;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Key {
        prefix: Ipv4Addr,
        prefix_len: u8,
        gateway: Ipv4Addr,
        if_index: IfIndex,
    }

    #[derive(Default)]
    struct FakeRouteTable {
        installed: Mutex<HashSet<Key>>,
        fail_add: bool,
        fail_remove: bool,
    }

    impl RouteTable for FakeRouteTable {
        fn add_route(
            &self,
            prefix: Ipv4Addr,
            prefix_len: u8,
            gateway: Ipv4Addr,
            if_index: IfIndex,
        ) -> Result<(), RouteError> {
            if self.fail_add {
                return Err(RouteError::AddFailed {
                    prefix,
                    prefix_len,
                    if_index,
                    detail: "fake failure".to_string(),
                });
            }
            self.installed.lock().insert(Key { prefix, prefix_len, gateway, if_index });
            Ok(())
        }

        fn remove_route(
            &self,
            prefix: Ipv4Addr,
            prefix_len: u8,
            gateway: Ipv4Addr,
            if_index: IfIndex,
        ) -> Result<(), RouteError> {
            if self.fail_remove {
                return Err(RouteError::RemoveFailed {
                    prefix,
                    prefix_len,
                    if_index,
                    detail: "fake failure".to_string(),
                });
            }
            self.installed.lock().remove(&Key { prefix, prefix_len, gateway, if_index });
            Ok(())
        }
    }

    #[test]
    fn install_adds_both_split_default_prefixes() {
        let table = Arc::new(FakeRouteTable::default());
        let gateway = Ipv4Addr::new(192, 168, 1, 1);
        let if_index = IfIndex::new(7);

        let guard = InstalledRoutes::install(table.clone(), gateway, if_index);
        assert_eq!(table.installed.lock().len(), 2);
        drop(guard);
    }

    #[test]
    fn drop_removes_both_routes() {
        let table = Arc::new(FakeRouteTable::default());
        let gateway = Ipv4Addr::new(192, 168, 1, 1);
        let if_index = IfIndex::new(7);

        let guard = InstalledRoutes::install(table.clone(), gateway, if_index);
        drop(guard);
        assert!(table.installed.lock().is_empty());
    }

    #[test]
    fn add_failure_does_not_panic_or_prevent_construction() {
        let table =
            Arc::new(FakeRouteTable { fail_add: true, ..FakeRouteTable::default() });
        let _guard =
            InstalledRoutes::install(table, Ipv4Addr::new(192, 168, 1, 1), IfIndex::new(7));
    }

    #[test]
    fn remove_failure_does_not_panic() {
        let table =
            Arc::new(FakeRouteTable { fail_remove: true, ..FakeRouteTable::default() });
        let guard = InstalledRoutes::install(
            table,
            Ipv4Addr::new(192, 168, 1, 1),
            IfIndex::new(7),
        );
        drop(guard);
    }
}
