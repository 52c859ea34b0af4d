// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The external kernel packet-capture layer (§6): filtered, prioritized interception of IPv4
//! TCP/UDP traffic, with in-place rewrite and re-injection. Backed by WinDivert, bound
//! dynamically via `libloading` so the engine can detect and report a missing driver instead of
//! failing to link.

#![deny(clippy::all)]

mod direction;
mod error;
pub mod fake;
mod filter;
mod handle;
mod packet;
mod sys;

pub use direction::Direction;
pub use error::{CaptureError, TransientCaptureError};
pub use fake::FakeCaptureHandle;
pub use filter::{INBOUND_PRIORITY, OUTBOUND_PRIORITY, filter_expression, priority};
pub use handle::{CaptureHandle, WinDivertCaptureHandle};
pub use packet::CapturedPacket;
