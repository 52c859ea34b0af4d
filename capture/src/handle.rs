// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::direction::Direction;
use crate::error::{CaptureError, TransientCaptureError};
use crate::filter::{filter_expression, priority};
use crate::packet::CapturedPacket;
use crate::sys::{self, OpenError, RecvError, WinDivertAddress};

/// The maximum size of a single captured packet. WinDivert documents this as `WINDIVERT_MTU_MAX`.
const MAX_PACKET_SIZE: usize = 65535;

/// The external capture-layer contract C4/C5 depend on (§6): open a filtered, prioritized
/// handle, block for the next packet, re-inject a packet, and unblock any pending read on close.
///
/// Kept as a trait so the diverters can be exercised in tests against [`crate::FakeCaptureHandle`]
/// rather than the real driver.
pub trait CaptureHandle: Send + Sync {
    /// Block until a packet matching this handle's filter is available.
    ///
    /// # Errors
    ///
    /// [`TransientCaptureError::Closed`] once [`CaptureHandle::close`] has been called;
    /// otherwise [`TransientCaptureError::Recv`] for a single failed read.
    fn recv(&self) -> Result<CapturedPacket, TransientCaptureError>;

    /// Re-inject `packet`, using its current interface/direction metadata.
    ///
    /// # Errors
    ///
    /// [`TransientCaptureError::Send`] if the driver rejects the packet.
    fn send(&self, packet: CapturedPacket) -> Result<(), TransientCaptureError>;

    /// Close the handle. Idempotent; unblocks any thread parked in [`CaptureHandle::recv`].
    fn close(&self);
}

/// [`CaptureHandle`] backed by a real WinDivert handle.
pub struct WinDivertCaptureHandle {
    raw: sys::RawHandle,
}

impl WinDivertCaptureHandle {
    /// Open a handle for `direction`, using the filter expression and priority §6 assigns it.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NotInstalled`] if the driver cannot be loaded; [`CaptureError::Open`] if
    /// the driver rejects the open call.
    pub fn open(direction: Direction) -> Result<Self, CaptureError> {
        let raw = sys::open(filter_expression(direction), priority(direction)).map_err(
            |err| match err {
                OpenError::NotInstalled(_) => CaptureError::NotInstalled,
                OpenError::Rejected(detail) => CaptureError::Open(detail),
            },
        )?;
        tracing::debug!(?direction, "opened capture handle");
        Ok(Self { raw })
    }
}

impl CaptureHandle for WinDivertCaptureHandle {
    fn recv(&self) -> Result<CapturedPacket, TransientCaptureError> {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        match sys::recv(&self.raw, &mut buf) {
            Ok((len, addr)) => {
                buf.truncate(len as usize);
                Ok(CapturedPacket::new(buf, addr.if_idx(), addr.outbound()))
            }
            Err(RecvError::Closed) => Err(TransientCaptureError::Closed),
            Err(RecvError::Other(detail)) => Err(TransientCaptureError::Recv(detail)),
        }
    }

    fn send(&self, packet: CapturedPacket) -> Result<(), TransientCaptureError> {
        let mut addr = WinDivertAddress::zeroed();
        addr.set_if_idx(packet.if_index());
        addr.set_outbound(packet.is_outbound());
        let bytes = packet.into_bytes();
        sys::send(&self.raw, &bytes, &addr).map_err(TransientCaptureError::Send)
    }

    fn close(&self) {
        sys::close(&self.raw);
    }
}
