// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Incremental (RFC 1624) checksum update.
//!
//! Rewriting a packet's source address only ever changes one 32-bit field, so a full checksum
//! recompute over the whole header/payload is wasted work on a path that runs per-packet.
//! Instead we apply the incremental-update identity from RFC 1624 ("Computation of the
//! Internet Checksum via Incremental Update"), which holds for the IPv4 header checksum and,
//! because the address is also part of the TCP/UDP pseudo-header, for the transport checksum
//! too.

/// Apply RFC 1624's incremental update for a 16-bit field change.
///
/// Given the notation from the RFC (`HC` the old header checksum, `m`/`m'` the old/new value of
/// the changed field), the new checksum is `HC' = HC - ~m - m'` using one's-complement
/// subtraction.
#[must_use]
fn incremental_update_16(checksum: u16, old_value: u16, new_value: u16) -> u16 {
    let (tmp, borrow) = checksum.overflowing_sub(!old_value);
    let tmp = if borrow { tmp.wrapping_sub(1) } else { tmp };

    let (result, borrow) = tmp.overflowing_sub(new_value);
    if borrow { result.wrapping_sub(1) } else { result }
}

/// Apply RFC 1624's incremental update for a 32-bit field change (e.g. an IPv4 address),
/// by applying [`incremental_update_16`] to each 16-bit half in turn.
#[must_use]
pub fn incremental_update_32(checksum: u16, old_value: u32, new_value: u32) -> u16 {
    let old_hi = (old_value >> 16) as u16;
    let old_lo = old_value as u16;
    let new_hi = (new_value >> 16) as u16;
    let new_lo = new_value as u16;

    let mid = incremental_update_16(checksum, old_hi, new_hi);
    incremental_update_16(mid, old_lo, new_lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ones_complement_sum(words: impl Iterator<Item = u16>) -> u32 {
        words.fold(0u32, |acc, w| acc + u32::from(w))
    }

    fn fold_to_16(mut sum: u32) -> u16 {
        while sum >> 16 != 0 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
        !(sum as u16)
    }

    fn addr_words(addr: Ipv4Addr) -> [u16; 2] {
        let octets = addr.octets();
        [
            u16::from_be_bytes([octets[0], octets[1]]),
            u16::from_be_bytes([octets[2], octets[3]]),
        ]
    }

    #[test]
    fn matches_full_recompute_on_address_change() {
        // A toy "header" that is nothing but two backwards IPv4 addresses, so the checksum
        // is computable directly as a one's-complement sum for comparison.
        let src_before = Ipv4Addr::new(10, 0, 0, 5);
        let dst = Ipv4Addr::new(8, 8, 8, 8);
        let src_after = Ipv4Addr::new(192, 168, 1, 20);

        let words_before = [addr_words(src_before), addr_words(dst)].concat();
        let checksum_before = fold_to_16(ones_complement_sum(words_before.into_iter()));

        let words_after = [addr_words(src_after), addr_words(dst)].concat();
        let checksum_after_full = fold_to_16(ones_complement_sum(words_after.into_iter()));

        let checksum_after_incremental = incremental_update_32(
            checksum_before,
            u32::from(src_before),
            u32::from(src_after),
        );

        assert_eq!(checksum_after_incremental, checksum_after_full);
    }

    #[test]
    fn no_op_change_is_identity() {
        let checksum = 0xABCD;
        let addr = u32::from(Ipv4Addr::new(1, 2, 3, 4));
        assert_eq!(incremental_update_32(checksum, addr, addr), checksum);
    }
}
