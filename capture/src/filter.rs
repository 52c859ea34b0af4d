// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The two filter expressions the engine opens handles with (§6). Both exclude loopback traffic
//! and restrict to IPv4 TCP/UDP; they differ only in direction and priority, with inbound
//! evaluated first so that return traffic for a diverted flow is seen before any competing
//! consumer.

use crate::direction::Direction;

/// Inbound's handle is opened at a higher priority than outbound's, per §6 ("the numeric
/// priority must be such that inbound is evaluated before any competing consumer").
pub const OUTBOUND_PRIORITY: i16 = 100;
/// See [`OUTBOUND_PRIORITY`].
pub const INBOUND_PRIORITY: i16 = 200;

/// The filter expression for `direction`, matching IPv4 TCP/UDP traffic with neither endpoint on
/// the loopback address.
#[must_use]
pub fn filter_expression(direction: Direction) -> &'static str {
    match direction {
        Direction::Outbound => {
            "outbound and ip and (tcp or udp) and ip.SrcAddr != 127.0.0.1 and ip.DstAddr != 127.0.0.1"
        }
        Direction::Inbound => {
            "inbound and ip and (tcp or udp) and ip.SrcAddr != 127.0.0.1 and ip.DstAddr != 127.0.0.1"
        }
    }
}

/// The priority a handle for `direction` should be opened at.
#[must_use]
pub fn priority(direction: Direction) -> i16 {
    match direction {
        Direction::Outbound => OUTBOUND_PRIORITY,
        Direction::Inbound => INBOUND_PRIORITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn outbound_filter_excludes_loopback() {
        let expr = filter_expression(Direction::Outbound);
        assert!(expr.starts_with("outbound"));
        assert!(expr.contains("127.0.0.1"));
    }

    #[test]
    fn inbound_outranks_outbound() {
        assert!(priority(Direction::Inbound) > priority(Direction::Outbound));
    }
}
