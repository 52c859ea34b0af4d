// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::collections::HashSet;
use std::net::Ipv4Addr;

use net::IfIndex;

use crate::error::ConfigError;
use crate::mode::Mode;
use crate::path::normalize_executable_path;

/// The validated, internal configuration the engine supervisor runs with for the duration of
/// one `start…stop` cycle.
///
/// Construction goes through [`EngineConfig::new`], which is the only way to obtain one: there
/// is no public constructor that skips validation, the same separation the reference codebase
/// draws between an external, wire-shaped configuration and its checked internal counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    mode: Mode,
    vpn_ip: Ipv4Addr,
    default_ip: Ipv4Addr,
    vpn_if_index: Option<IfIndex>,
    default_if_index: Option<IfIndex>,
    default_gateway: Option<Ipv4Addr>,
    toggled_set: HashSet<String>,
}

impl EngineConfig {
    /// Validate and build a new configuration.
    ///
    /// `toggled_apps` entries are case-folded on the way in via
    /// [`normalize_executable_path`], so callers may pass paths in whatever case the user
    /// typed them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SameAddress`] if `vpn_ip == default_ip`,
    /// [`ConfigError::ZeroInterfaceIndex`] if either interface index is present but zero, or
    /// [`ConfigError::UnspecifiedGateway`] if a gateway is present but unspecified.
    pub fn new(
        mode: Mode,
        vpn_ip: Ipv4Addr,
        default_ip: Ipv4Addr,
        vpn_if_index: Option<IfIndex>,
        default_if_index: Option<IfIndex>,
        default_gateway: Option<Ipv4Addr>,
        toggled_apps: impl IntoIterator<Item = String>,
    ) -> Result<Self, ConfigError> {
        if vpn_ip == default_ip {
            return Err(ConfigError::SameAddress(vpn_ip));
        }
        if vpn_if_index.is_some_and(|ifi| ifi.as_u32() == 0)
            || default_if_index.is_some_and(|ifi| ifi.as_u32() == 0)
        {
            return Err(ConfigError::ZeroInterfaceIndex);
        }
        if default_gateway.is_some_and(|gw| gw.is_unspecified()) {
            return Err(ConfigError::UnspecifiedGateway);
        }

        Ok(Self {
            mode,
            vpn_ip,
            default_ip,
            vpn_if_index,
            default_if_index,
            default_gateway,
            toggled_set: toggled_apps
                .into_iter()
                .map(|path| normalize_executable_path(&path))
                .collect(),
        })
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The VPN interface's address.
    #[must_use]
    pub fn vpn_ip(&self) -> Ipv4Addr {
        self.vpn_ip
    }

    /// The physical default interface's address.
    #[must_use]
    pub fn default_ip(&self) -> Ipv4Addr {
        self.default_ip
    }

    /// The VPN interface's index, if known.
    #[must_use]
    pub fn vpn_if_index(&self) -> Option<IfIndex> {
        self.vpn_if_index
    }

    /// The physical default interface's index, if known.
    #[must_use]
    pub fn default_if_index(&self) -> Option<IfIndex> {
        self.default_if_index
    }

    /// The physical default interface's gateway, if known.
    #[must_use]
    pub fn default_gateway(&self) -> Option<Ipv4Addr> {
        self.default_gateway
    }

    /// `true` if the (already normalized) executable path is in the toggled set.
    #[must_use]
    pub fn is_toggled(&self, normalized_exe_path: &str) -> bool {
        self.toggled_set.contains(normalized_exe_path)
    }

    /// Iterate the normalized toggled paths, to seed a collaborator's own copy of the set.
    pub fn toggled_iter(&self) -> impl Iterator<Item = &str> {
        self.toggled_set.iter().map(String::as_str)
    }

    /// Replace the toggled set, case-folding every entry on the way in.
    pub fn set_toggled(&mut self, toggled_apps: impl IntoIterator<Item = String>) {
        self.toggled_set = toggled_apps
            .into_iter()
            .map(|path| normalize_executable_path(&path))
            .collect();
    }

    /// Replace the mode.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ips() -> (Ipv4Addr, Ipv4Addr) {
        (Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(192, 168, 1, 20))
    }

    #[test]
    fn rejects_identical_addresses() {
        let (vpn_ip, _) = ips();
        let err = EngineConfig::new(Mode::VpnDefault, vpn_ip, vpn_ip, None, None, None, [])
            .unwrap_err();
        assert_eq!(err, ConfigError::SameAddress(vpn_ip));
    }

    #[test]
    fn rejects_zero_interface_index() {
        let (vpn_ip, default_ip) = ips();
        let err = EngineConfig::new(
            Mode::VpnDefault,
            vpn_ip,
            default_ip,
            Some(IfIndex::new(0)),
            None,
            None,
            [],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::ZeroInterfaceIndex);
    }

    #[test]
    fn rejects_unspecified_gateway() {
        let (vpn_ip, default_ip) = ips();
        let err = EngineConfig::new(
            Mode::VpnDefault,
            vpn_ip,
            default_ip,
            None,
            None,
            Some(Ipv4Addr::UNSPECIFIED),
            [],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::UnspecifiedGateway);
    }

    #[test]
    fn toggled_set_is_case_folded() {
        let (vpn_ip, default_ip) = ips();
        let config = EngineConfig::new(
            Mode::VpnDefault,
            vpn_ip,
            default_ip,
            None,
            None,
            None,
            [r"C:\app\browser.exe".to_string()],
        )
        .unwrap();

        assert!(config.is_toggled(&normalize_executable_path(r"c:\APP\Browser.EXE")));
    }

    #[test]
    fn accepts_well_formed_config() {
        let (vpn_ip, default_ip) = ips();
        assert!(
            EngineConfig::new(
                Mode::VpnDefault,
                vpn_ip,
                default_ip,
                Some(IfIndex::new(12)),
                Some(IfIndex::new(7)),
                Some(Ipv4Addr::new(192, 168, 1, 1)),
                [],
            )
            .is_ok()
        );
    }
}
