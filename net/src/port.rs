// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::num::NonZero;

/// A non-zero TCP or UDP port number.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Port(NonZero<u16>);

/// Error constructing a [`Port`].
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, thiserror::Error)]
pub enum PortError {
    /// Port zero does not identify a real socket.
    #[error("port must be non-zero")]
    Zero,
}

impl Port {
    /// Build a [`Port`] from a raw `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Zero`] if `port` is zero.
    pub const fn new(port: u16) -> Result<Self, PortError> {
        match NonZero::new(port) {
            Some(port) => Ok(Self(port)),
            None => Err(PortError::Zero),
        }
    }

    /// Get the raw `u16` value of this port.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0.get()
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(port: u16) -> Result<Self, Self::Error> {
        Self::new(port)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.as_u16()
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert_eq!(Port::new(0), Err(PortError::Zero));
    }

    #[test]
    fn round_trips_through_u16() {
        let port = Port::new(44000).unwrap();
        assert_eq!(u16::from(port), 44000);
    }
}
