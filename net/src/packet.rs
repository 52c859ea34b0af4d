// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::TransportProtocol;
use crate::checksum::incremental_update_32;
use std::net::Ipv4Addr;

/// A malformed or truncated packet could not be interpreted as an IPv4 datagram.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// Fewer than 20 bytes, or fewer than the header length claims.
    #[error("packet too short to contain an IPv4 header")]
    TooShort,
    /// The version nibble was not 4.
    #[error("not an IPv4 packet (version nibble = {0})")]
    NotIpv4(u8),
}

const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV4_SRC_OFFSET: usize = 12;
const IPV4_DST_OFFSET: usize = 16;
const IPV4_CHECKSUM_OFFSET: usize = 10;
const IPV4_PROTOCOL_OFFSET: usize = 9;

const TCP_CHECKSUM_OFFSET: usize = 16;
const TCP_MIN_HEADER_LEN: usize = 20;
const UDP_CHECKSUM_OFFSET: usize = 6;
const UDP_MIN_HEADER_LEN: usize = 8;

/// A mutable, in-place view over an IPv4 datagram held in a byte buffer owned by the capture
/// layer.
///
/// This is deliberately not a general parser: it exposes exactly the operations the diverters
/// need (read the endpoints, rewrite the source or destination address and keep the IPv4/TCP/UDP
/// checksums consistent) and nothing else, so the hot path never allocates.
pub struct Ipv4PacketMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> Ipv4PacketMut<'a> {
    /// Interpret `bytes` as an IPv4 datagram.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError`] if `bytes` is too short or is not IPv4.
    pub fn parse(bytes: &'a mut [u8]) -> Result<Self, PacketError> {
        if bytes.len() < IPV4_MIN_HEADER_LEN {
            return Err(PacketError::TooShort);
        }
        let version = bytes[0] >> 4;
        if version != 4 {
            return Err(PacketError::NotIpv4(version));
        }
        let header_len = Self::header_len_of(bytes);
        if bytes.len() < header_len + 4 {
            // need at least the first 4 bytes of whatever transport header follows, since
            // that's where source/destination ports live for both TCP and UDP
            return Err(PacketError::TooShort);
        }
        Ok(Self { bytes })
    }

    fn header_len_of(bytes: &[u8]) -> usize {
        usize::from(bytes[0] & 0x0F) * 4
    }

    fn header_len(&self) -> usize {
        Self::header_len_of(self.bytes)
    }

    /// The transport protocol carried by this datagram, or `None` if it is neither TCP nor UDP.
    #[must_use]
    pub fn protocol(&self) -> Option<TransportProtocol> {
        TransportProtocol::from_ip_protocol_number(self.bytes[IPV4_PROTOCOL_OFFSET])
    }

    /// The IPv4 source address.
    #[must_use]
    pub fn source(&self) -> Ipv4Addr {
        let o = IPV4_SRC_OFFSET;
        Ipv4Addr::new(self.bytes[o], self.bytes[o + 1], self.bytes[o + 2], self.bytes[o + 3])
    }

    /// The IPv4 destination address.
    #[must_use]
    pub fn destination(&self) -> Ipv4Addr {
        let o = IPV4_DST_OFFSET;
        Ipv4Addr::new(self.bytes[o], self.bytes[o + 1], self.bytes[o + 2], self.bytes[o + 3])
    }

    fn transport_header(&self) -> &[u8] {
        &self.bytes[self.header_len()..]
    }

    /// The transport-layer source port, if this is TCP or UDP and the packet is long enough to
    /// contain one.
    #[must_use]
    pub fn source_port(&self) -> Option<u16> {
        self.protocol()?;
        let t = self.transport_header();
        (t.len() >= 2).then(|| u16::from_be_bytes([t[0], t[1]]))
    }

    /// The transport-layer destination port, if this is TCP or UDP and the packet is long enough
    /// to contain one.
    #[must_use]
    pub fn destination_port(&self) -> Option<u16> {
        self.protocol()?;
        let t = self.transport_header();
        (t.len() >= 4).then(|| u16::from_be_bytes([t[2], t[3]]))
    }

    /// Rewrite the IPv4 source address in place, keeping the IPv4 and transport checksums
    /// consistent via RFC 1624 incremental update.
    pub fn set_source(&mut self, new_addr: Ipv4Addr) {
        self.rewrite_address(IPV4_SRC_OFFSET, new_addr);
    }

    /// Rewrite the IPv4 destination address in place, keeping the IPv4 and transport checksums
    /// consistent via RFC 1624 incremental update.
    pub fn set_destination(&mut self, new_addr: Ipv4Addr) {
        self.rewrite_address(IPV4_DST_OFFSET, new_addr);
    }

    fn rewrite_address(&mut self, offset: usize, new_addr: Ipv4Addr) {
        let old = u32::from(self.addr_at(offset));
        let new = u32::from(new_addr);
        if old == new {
            return;
        }

        let ipv4_checksum = u16::from_be_bytes([
            self.bytes[IPV4_CHECKSUM_OFFSET],
            self.bytes[IPV4_CHECKSUM_OFFSET + 1],
        ]);
        let updated = incremental_update_32(ipv4_checksum, old, new);
        self.bytes[IPV4_CHECKSUM_OFFSET..IPV4_CHECKSUM_OFFSET + 2]
            .copy_from_slice(&updated.to_be_bytes());

        self.bytes[offset..offset + 4].copy_from_slice(&new_addr.octets());

        self.update_transport_checksum(old, new);
    }

    fn addr_at(&self, offset: usize) -> Ipv4Addr {
        Ipv4Addr::new(
            self.bytes[offset],
            self.bytes[offset + 1],
            self.bytes[offset + 2],
            self.bytes[offset + 3],
        )
    }

    fn update_transport_checksum(&mut self, old_addr: u32, new_addr: u32) {
        let Some(protocol) = self.protocol() else {
            return;
        };
        let header_len = self.header_len();
        let (checksum_offset, min_len) = match protocol {
            TransportProtocol::Tcp => (TCP_CHECKSUM_OFFSET, TCP_MIN_HEADER_LEN),
            TransportProtocol::Udp => (UDP_CHECKSUM_OFFSET, UDP_MIN_HEADER_LEN),
        };
        if self.bytes.len() < header_len + min_len {
            return;
        }
        let at = header_len + checksum_offset;
        let current = u16::from_be_bytes([self.bytes[at], self.bytes[at + 1]]);

        // UDP checksum is optional in IPv4; an all-zero checksum means "not computed", and
        // must stay all-zero rather than being incrementally updated into a bogus non-zero
        // value.
        if protocol == TransportProtocol::Udp && current == 0 {
            return;
        }

        let updated = incremental_update_32(current, old_addr, new_addr);
        self.bytes[at..at + 2].copy_from_slice(&updated.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Build a minimal IPv4+TCP packet: 20-byte IPv4 header, 20-byte TCP header, no payload.
    /// The checksums are *not* made valid — tests only assert the checksum field changes the
    /// way RFC 1624 predicts, not that it matches a real TCP/IP stack's checksum.
    fn build_tcp_packet(src: Ipv4Addr, dst: Ipv4Addr, src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut pkt = vec![0u8; 40];
        pkt[0] = 0x45; // version 4, IHL 5
        pkt[2..4].copy_from_slice(&40u16.to_be_bytes());
        pkt[IPV4_PROTOCOL_OFFSET] = 6; // TCP
        pkt[IPV4_CHECKSUM_OFFSET..IPV4_CHECKSUM_OFFSET + 2].copy_from_slice(&0x1234u16.to_be_bytes());
        pkt[IPV4_SRC_OFFSET..IPV4_SRC_OFFSET + 4].copy_from_slice(&src.octets());
        pkt[IPV4_DST_OFFSET..IPV4_DST_OFFSET + 4].copy_from_slice(&dst.octets());

        let tcp = &mut pkt[20..];
        tcp[0..2].copy_from_slice(&src_port.to_be_bytes());
        tcp[2..4].copy_from_slice(&dst_port.to_be_bytes());
        tcp[TCP_CHECKSUM_OFFSET..TCP_CHECKSUM_OFFSET + 2].copy_from_slice(&0xBEEFu16.to_be_bytes());
        pkt
    }

    #[test]
    fn rejects_short_buffers() {
        let mut buf = [0u8; 10];
        assert_eq!(Ipv4PacketMut::parse(&mut buf), Err(PacketError::TooShort));
    }

    #[test]
    fn rejects_non_ipv4() {
        let mut buf = [0x60u8; 24];
        assert_eq!(Ipv4PacketMut::parse(&mut buf), Err(PacketError::NotIpv4(6)));
    }

    #[test]
    fn reads_endpoints() {
        let src = Ipv4Addr::new(10, 0, 0, 5);
        let dst = Ipv4Addr::new(8, 8, 8, 8);
        let mut pkt = build_tcp_packet(src, dst, 44000, 443);
        let view = Ipv4PacketMut::parse(&mut pkt).unwrap();

        assert_eq!(view.source(), src);
        assert_eq!(view.destination(), dst);
        assert_eq!(view.protocol(), Some(TransportProtocol::Tcp));
        assert_eq!(view.source_port(), Some(44000));
        assert_eq!(view.destination_port(), Some(443));
    }

    #[test]
    fn set_source_updates_ip_and_tcp_checksums() {
        let src = Ipv4Addr::new(10, 0, 0, 5);
        let dst = Ipv4Addr::new(8, 8, 8, 8);
        let new_src = Ipv4Addr::new(192, 168, 1, 20);
        let mut pkt = build_tcp_packet(src, dst, 44000, 443);

        let ip_checksum_before =
            u16::from_be_bytes([pkt[IPV4_CHECKSUM_OFFSET], pkt[IPV4_CHECKSUM_OFFSET + 1]]);
        let tcp_checksum_before = u16::from_be_bytes([
            pkt[20 + TCP_CHECKSUM_OFFSET],
            pkt[20 + TCP_CHECKSUM_OFFSET + 1],
        ]);

        let mut view = Ipv4PacketMut::parse(&mut pkt).unwrap();
        view.set_source(new_src);
        assert_eq!(view.source(), new_src);

        let ip_checksum_after =
            u16::from_be_bytes([pkt[IPV4_CHECKSUM_OFFSET], pkt[IPV4_CHECKSUM_OFFSET + 1]]);
        let tcp_checksum_after = u16::from_be_bytes([
            pkt[20 + TCP_CHECKSUM_OFFSET],
            pkt[20 + TCP_CHECKSUM_OFFSET + 1],
        ]);

        assert_eq!(
            ip_checksum_after,
            incremental_update_32(ip_checksum_before, u32::from(src), u32::from(new_src))
        );
        assert_eq!(
            tcp_checksum_after,
            incremental_update_32(tcp_checksum_before, u32::from(src), u32::from(new_src))
        );
    }

    #[test]
    fn set_source_is_a_no_op_when_address_is_unchanged() {
        let src = Ipv4Addr::new(10, 0, 0, 5);
        let dst = Ipv4Addr::new(8, 8, 8, 8);
        let mut pkt = build_tcp_packet(src, dst, 44000, 443);
        let before = pkt.clone();

        let mut view = Ipv4PacketMut::parse(&mut pkt).unwrap();
        view.set_source(src);

        assert_eq!(pkt, before);
    }

    #[test]
    fn zero_udp_checksum_is_left_untouched() {
        let src = Ipv4Addr::new(10, 0, 0, 5);
        let dst = Ipv4Addr::new(8, 8, 8, 8);
        let mut pkt = build_tcp_packet(src, dst, 44000, 443);
        pkt[IPV4_PROTOCOL_OFFSET] = 17; // UDP
        pkt[20 + UDP_CHECKSUM_OFFSET..20 + UDP_CHECKSUM_OFFSET + 2].copy_from_slice(&[0, 0]);

        let mut view = Ipv4PacketMut::parse(&mut pkt).unwrap();
        view.set_source(Ipv4Addr::new(192, 168, 1, 20));

        assert_eq!(&pkt[20 + UDP_CHECKSUM_OFFSET..20 + UDP_CHECKSUM_OFFSET + 2], &[0, 0]);
    }
}
