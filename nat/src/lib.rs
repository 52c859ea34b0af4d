// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all)]

//! The outbound diverter's NAT table and the inbound diverter's reverse lookup into it.
//!
//! Keyed by `(remote_ip, remote_port, local_port)` rather than the more obvious
//! `(local_ip, local_port, remote_ip, remote_port)`: after the outbound diverter rewrites the
//! source address, the reply's destination address is the *rewritten* address, so the only
//! identifier stable across both directions is the remote endpoint plus the original local
//! port. See the engine's outbound/inbound diverters for how this table is used.

mod table;

pub use table::{NatEntry, NatKey, NatTable};
