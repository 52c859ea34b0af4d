// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

/// Errors fatal to opening the capture subsystem. Per §7, only these surface from the
/// supervisor's `start`; everything else is handled locally by the worker that hit it.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The capture driver is not installed, or could not be loaded.
    #[error("packet capture subsystem is not installed")]
    NotInstalled,
    /// A handle could not be opened (permissions, a filter the driver rejected, or the driver
    /// refusing a second handle at a given layer/priority).
    #[error("failed to open capture handle: {0}")]
    Open(String),
}

/// A single `recv`/`send` failure. Non-fatal: per §7 the caller logs at debug and continues the
/// loop unless a stop has been requested.
#[derive(Debug, thiserror::Error)]
pub enum TransientCaptureError {
    /// The blocking read failed for a reason other than the handle being closed.
    #[error("capture recv failed: {0}")]
    Recv(String),
    /// Re-injection failed.
    #[error("capture send failed: {0}")]
    Send(String),
    /// `recv` returned because the handle was closed (supervisor shutdown). Callers treat this
    /// as the signal to exit their loop, not as a packet to retry.
    #[error("capture handle closed")]
    Closed,
}
