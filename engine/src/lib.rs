// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The engine supervisor: wires together port resolution (C1), flow tracking (C2), route
//! programming (C3), and the outbound/inbound diverters (C4/C5) behind one lifecycle contract.
//!
//! [`Engine`] is the only public surface. Everything else in this crate exists to build one.

#![deny(clippy::all)]

mod error;
mod inbound;
mod logging;
mod outbound;
mod policy;
mod supervisor;

pub use error::EngineError;
pub use supervisor::Engine;
