// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use net::Port;

use crate::pid::Pid;

/// Synchronous port→process resolution, the exact-now fallback for a flow the periodic tracker
/// hasn't indexed yet.
///
/// Implementations must not cache results: caching the answer across calls is the tracker's
/// job, not the resolver's, since only the tracker knows when a mapping has gone stale.
pub trait PortResolver: Send + Sync {
    /// Find the PID currently owning `port`, trying TCP before UDP.
    fn resolve(&self, port: Port) -> Option<Pid>;
}
