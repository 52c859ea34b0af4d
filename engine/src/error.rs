// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

/// The only two failure kinds that surface from [`crate::Engine::start`]; everything else is
/// handled locally by the component that hit it and never propagates (§7, "Propagation policy").
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The capture driver is not installed.
    #[error("packet capture subsystem is not installed")]
    NotInstalled,
    /// A capture handle could not be opened.
    #[error("failed to open capture handle: {0}")]
    CaptureOpen(String),
}

impl From<capture::CaptureError> for EngineError {
    fn from(err: capture::CaptureError) -> Self {
        match err {
            capture::CaptureError::NotInstalled => Self::NotInstalled,
            capture::CaptureError::Open(detail) => Self::CaptureOpen(detail),
        }
    }
}
