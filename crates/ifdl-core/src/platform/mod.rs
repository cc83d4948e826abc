//! Platform capabilities consumed by the interface managers.
//!
//! The managers never talk to the operating system directly: interface
//! enumeration, link control, addressing, default-route selection, Wi-Fi
//! association and cellular sessions all go through the traits below. The
//! host implementations live in [`host`] and [`tools`]; tests substitute
//! in-memory fakes.

pub mod host;
pub mod tools;

#[cfg(test)]
pub(crate) mod fake;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use crate::error::NetworkError;

/// Reference to a platform interface, obtained by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceHandle {
    name: String,
    index: u32,
}

impl InterfaceHandle {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for InterfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

/// One address bound to an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub ip: IpAddr,
    pub netmask: Option<IpAddr>,
}

impl InterfaceAddress {
    /// An address that can carry outbound traffic: not loopback, not
    /// unspecified, and not an IPv6 link-local address (those exist before
    /// any DHCP/SLAAC exchange completed).
    pub fn is_usable(&self) -> bool {
        if self.ip.is_loopback() || self.ip.is_unspecified() {
            return false;
        }
        match self.ip {
            IpAddr::V4(v4) => !v4.is_link_local(),
            IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) != 0xfe80,
        }
    }
}

/// Snapshot of one platform interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub index: u32,
    pub is_up: bool,
    pub is_running: bool,
    pub is_loopback: bool,
    pub addresses: Vec<InterfaceAddress>,
}

impl InterfaceInfo {
    pub fn handle(&self) -> InterfaceHandle {
        InterfaceHandle::new(self.name.clone(), self.index)
    }

    pub fn usable_address(&self) -> Option<&InterfaceAddress> {
        self.addresses.iter().find(|a| a.is_usable())
    }
}

/// Requested addressing mode for an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpSettings {
    pub dhcp: bool,
    pub static_dns: bool,
}

impl IpSettings {
    /// DHCP for address and DNS.
    pub fn dhcp() -> Self {
        Self {
            dhcp: true,
            static_dns: false,
        }
    }
}

/// Addressing an interface ended up with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpConfiguration {
    pub ip: Option<IpAddr>,
    pub netmask: Option<IpAddr>,
    pub gateway: Option<IpAddr>,
    pub dns: Vec<IpAddr>,
    pub is_static: bool,
}

/// Interface enumeration, link control, addressing and route selection.
pub trait NetworkPlatform: Send + Sync {
    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, NetworkError>;
    fn is_started(&self, iface: &InterfaceHandle) -> bool;
    fn start(&self, iface: &InterfaceHandle) -> Result<(), NetworkError>;
    fn is_enabled(&self, iface: &InterfaceHandle) -> bool;
    fn enable(&self, iface: &InterfaceHandle) -> Result<(), NetworkError>;
    fn configure(&self, iface: &InterfaceHandle, settings: &IpSettings) -> Result<(), NetworkError>;
    fn ip_configuration(&self, iface: &InterfaceHandle) -> Result<IpConfiguration, NetworkError>;
    /// Make `iface` the process-wide default outbound route.
    fn set_default(&self, iface: &InterfaceHandle) -> Result<(), NetworkError>;
}

/// Look `name` up in the current interface list.
pub fn find_interface_info(
    platform: &dyn NetworkPlatform,
    name: &str,
) -> Result<Option<InterfaceInfo>, NetworkError> {
    Ok(platform.interfaces()?.into_iter().find(|i| i.name == name))
}

/// Wi-Fi security modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    Open,
    Wpa1,
    Wpa2,
    Wpa3,
    MixedWpa1Wpa2,
    MixedWpa2Wpa3,
}

impl SecurityMode {
    /// Legacy numeric security index used by older harness property files.
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            6 => Some(SecurityMode::MixedWpa1Wpa2),
            7 => Some(SecurityMode::Open),
            9 => Some(SecurityMode::Wpa1),
            10 => Some(SecurityMode::Wpa2),
            11 => Some(SecurityMode::Wpa3),
            12 => Some(SecurityMode::MixedWpa2Wpa3),
            _ => None,
        }
    }
}

/// Access point the radio is associated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String,
    pub bssid: Option<String>,
}

/// Wi-Fi association.
pub trait WifiRadio: Send + Sync {
    fn join(&self, ssid: &str, passphrase: &str, security: SecurityMode) -> Result<(), NetworkError>;
    /// The currently joined access point, if any.
    fn joined(&self) -> Result<Option<AccessPoint>, NetworkError>;
    fn leave(&self) -> Result<(), NetworkError>;
}

/// Cellular modem: SIM unlock and PDP data sessions.
pub trait Modem: Send + Sync {
    fn unlock_sim(&self, pin: &str) -> Result<(), NetworkError>;
    fn activate_session(&self, apn: &str, user: &str, passphrase: &str) -> Result<(), NetworkError>;
    fn deactivate_session(&self) -> Result<(), NetworkError>;
}

/// The process-wide default outbound interface.
///
/// Written by the host platform's `set_default`, read by the HTTP transport
/// when it opens a connection. Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct DefaultRoute {
    current: Arc<RwLock<Option<String>>>,
}

impl DefaultRoute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str) {
        let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(name.to_string());
    }

    pub fn current(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn addr(ip: IpAddr) -> InterfaceAddress {
        InterfaceAddress { ip, netmask: None }
    }

    #[test]
    fn usable_address_rules() {
        assert!(addr(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))).is_usable());
        assert!(!addr(IpAddr::V4(Ipv4Addr::LOCALHOST)).is_usable());
        assert!(!addr(IpAddr::V4(Ipv4Addr::UNSPECIFIED)).is_usable());
        assert!(!addr(IpAddr::V4(Ipv4Addr::new(169, 254, 3, 4))).is_usable());
        assert!(!addr(IpAddr::V6(Ipv6Addr::LOCALHOST)).is_usable());
        assert!(!addr("fe80::1".parse().unwrap()).is_usable());
        assert!(addr("2001:db8::10".parse().unwrap()).is_usable());
    }

    #[test]
    fn legacy_security_indices() {
        assert_eq!(SecurityMode::from_index(7), Some(SecurityMode::Open));
        assert_eq!(SecurityMode::from_index(10), Some(SecurityMode::Wpa2));
        assert_eq!(SecurityMode::from_index(12), Some(SecurityMode::MixedWpa2Wpa3));
        assert_eq!(SecurityMode::from_index(8), None);
    }

    #[test]
    fn default_route_is_shared_between_clones() {
        let route = DefaultRoute::new();
        let reader = route.clone();
        assert_eq!(reader.current(), None);
        route.set("wlan0");
        assert_eq!(reader.current().as_deref(), Some("wlan0"));
        route.set("eth0");
        assert_eq!(reader.current().as_deref(), Some("eth0"));
    }
}
