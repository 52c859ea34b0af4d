// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

/// The driver's per-packet metadata record (`WINDIVERT_ADDRESS`). Its C definition packs several
/// single-bit flags and a layer-specific union into 80 bytes; Rust has no native bitfield
/// support, so this is a fixed-size byte buffer with accessor methods at the known offsets
/// rather than a `#[repr(C)]` struct mirroring the C layout field-for-field.
pub const WINDIVERT_ADDRESS_SIZE: usize = 80;

const OUTBOUND_BYTE: usize = 8;
const OUTBOUND_BIT: u8 = 0b0000_0010;
/// `WINDIVERT_DATA_NETWORK.IfIdx`: the first field of the address's layer-data union, which for
/// the network layer starts right after the fixed 16-byte header (timestamp + flags + reserved).
const IF_IDX_OFFSET: usize = 16;

/// A `WINDIVERT_ADDRESS` record, read from or about to be written to the driver.
#[derive(Clone)]
pub struct WinDivertAddress {
    raw: [u8; WINDIVERT_ADDRESS_SIZE],
}

impl WinDivertAddress {
    /// A zeroed record, suitable as an out-parameter for `WinDivertRecv`.
    #[must_use]
    pub fn zeroed() -> Self {
        Self { raw: [0u8; WINDIVERT_ADDRESS_SIZE] }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.raw.as_mut_ptr()
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.raw.as_ptr()
    }

    /// Whether the driver classifies this capture as outbound.
    #[must_use]
    pub fn outbound(&self) -> bool {
        self.raw[OUTBOUND_BYTE] & OUTBOUND_BIT != 0
    }

    /// Set the outbound flag, as re-injection requires when steering a packet back out an
    /// interface in the opposite direction it arrived on.
    pub fn set_outbound(&mut self, outbound: bool) {
        if outbound {
            self.raw[OUTBOUND_BYTE] |= OUTBOUND_BIT;
        } else {
            self.raw[OUTBOUND_BYTE] &= !OUTBOUND_BIT;
        }
    }

    /// The network interface index the packet was captured on, or the one it should be
    /// re-injected through.
    #[must_use]
    pub fn if_idx(&self) -> u32 {
        u32::from_ne_bytes(self.raw[IF_IDX_OFFSET..IF_IDX_OFFSET + 4].try_into().unwrap())
    }

    /// Rewrite the interface index.
    pub fn set_if_idx(&mut self, if_idx: u32) {
        self.raw[IF_IDX_OFFSET..IF_IDX_OFFSET + 4].copy_from_slice(&if_idx.to_ne_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn outbound_flag_round_trips() {
        let mut addr = WinDivertAddress::zeroed();
        assert!(!addr.outbound());
        addr.set_outbound(true);
        assert!(addr.outbound());
        addr.set_outbound(false);
        assert!(!addr.outbound());
    }

    #[test]
    fn if_idx_round_trips_without_disturbing_outbound() {
        let mut addr = WinDivertAddress::zeroed();
        addr.set_outbound(true);
        addr.set_if_idx(7);
        assert_eq!(addr.if_idx(), 7);
        assert!(addr.outbound());
    }
}
