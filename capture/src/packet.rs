// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use net::{Ipv4PacketMut, PacketError};

/// One packet as handed back by [`crate::CaptureHandle::recv`]: the raw bytes plus the
/// interface/direction metadata the driver attaches to every capture, per §6 ("mutable fields
/// ... `interface=(if_index, direction_flag)`").
///
/// `if_index` and `outbound` are mutable independently of the payload: C4/C5 rewrite them to
/// steer re-injection onto a specific adapter (§4.4 step 6, §4.6's strong-host-model interface
/// rewrite) without touching the bytes.
pub struct CapturedPacket {
    bytes: Vec<u8>,
    if_index: u32,
    outbound: bool,
}

impl CapturedPacket {
    /// Wrap a raw capture: `bytes` as read off the wire, `if_index`/`outbound` as reported by
    /// the driver for this capture.
    #[must_use]
    pub fn new(bytes: Vec<u8>, if_index: u32, outbound: bool) -> Self {
        Self { bytes, if_index, outbound }
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume this packet, returning its raw bytes (for re-injection).
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The interface the packet arrived on, or the interface it should be re-injected through
    /// if that has been rewritten.
    #[must_use]
    pub fn if_index(&self) -> u32 {
        self.if_index
    }

    /// `true` if the driver classifies this packet as outbound.
    #[must_use]
    pub fn is_outbound(&self) -> bool {
        self.outbound
    }

    /// Rewrite the interface metadata used on re-injection, without touching the payload.
    pub fn set_interface(&mut self, if_index: u32, outbound: bool) {
        self.if_index = if_index;
        self.outbound = outbound;
    }

    /// Obtain a mutable IPv4 view over the payload, for reading endpoints or rewriting an
    /// address with checksum maintenance.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError`] if the payload is not a well-formed IPv4 datagram.
    pub fn ipv4(&mut self) -> Result<Ipv4PacketMut<'_>, PacketError> {
        Ipv4PacketMut::parse(&mut self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_interface_does_not_touch_payload() {
        let mut pkt = CapturedPacket::new(vec![1, 2, 3], 4, true);
        pkt.set_interface(9, false);
        assert_eq!(pkt.if_index(), 9);
        assert!(!pkt.is_outbound());
        assert_eq!(pkt.bytes(), &[1, 2, 3]);
    }
}
