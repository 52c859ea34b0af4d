// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Port→PID resolution and PID→executable-path resolution, the two synchronous OS queries the
//! outbound diverter and the flow tracker fall back to when their own indexes don't yet have an
//! answer.

#![deny(clippy::all)]

mod buffer;
mod exe_path;
mod pid;
mod resolver;
mod windows_resolver;

pub use buffer::{GrowBuffer, QueryOutcome, classify};
pub use exe_path::resolve_executable_path;
pub use pid::Pid;
pub use resolver::PortResolver;
pub use windows_resolver::WindowsPortResolver;
