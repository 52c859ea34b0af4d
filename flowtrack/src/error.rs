// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use thiserror::Error;

/// Failures from a [`crate::SocketEnumerator`] cycle.
///
/// Never fatal: per §4.2 ("Failure behavior"), the tracker logs whichever variant it gets and
/// skips the cycle, leaving the previous tables in place.
#[derive(Debug, Error)]
pub enum EnumerationError {
    /// The TCP table could not be enumerated.
    #[error("failed to enumerate TCP sockets: {0}")]
    Tcp(String),
    /// The UDP table could not be enumerated.
    #[error("failed to enumerate UDP sockets: {0}")]
    Udp(String),
}
