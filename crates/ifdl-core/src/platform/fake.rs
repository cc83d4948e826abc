//! In-memory platform, radio and modem used by unit tests.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Mutex;

use super::{
    AccessPoint, DefaultRoute, InterfaceAddress, InterfaceHandle, InterfaceInfo, IpConfiguration,
    IpSettings, Modem, NetworkPlatform, SecurityMode, WifiRadio,
};
use crate::error::NetworkError;

struct FakeIface {
    info: InterfaceInfo,
    started: bool,
    /// Listings left before the interface shows up.
    hidden_for: usize,
    /// Listings left (once visible) before `pending_addr` is attached.
    unaddressed_for: usize,
    pending_addr: Option<InterfaceAddress>,
}

#[derive(Default)]
pub(crate) struct FakePlatform {
    ifaces: Mutex<Vec<FakeIface>>,
    calls: Mutex<Vec<String>>,
    fail_enable: Mutex<HashSet<String>>,
    pub(crate) route: DefaultRoute,
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Interface that is present, started, enabled and addressed.
    pub(crate) fn add_ready(&self, name: &str, ip: &str) {
        self.add(name, true, true, 0, 0, Some(ip));
    }

    pub(crate) fn add(
        &self,
        name: &str,
        started: bool,
        enabled: bool,
        hidden_for: usize,
        unaddressed_for: usize,
        ip: Option<&str>,
    ) {
        let mut ifaces = self.ifaces.lock().unwrap();
        let index = ifaces.len() as u32 + 1;
        ifaces.push(FakeIface {
            info: InterfaceInfo {
                name: name.to_string(),
                index,
                is_up: enabled,
                is_running: enabled,
                is_loopback: false,
                addresses: Vec::new(),
            },
            started,
            hidden_for,
            unaddressed_for,
            pending_addr: ip.map(|ip| InterfaceAddress {
                ip: ip.parse::<IpAddr>().unwrap(),
                netmask: Some("255.255.255.0".parse().unwrap()),
            }),
        });
    }

    pub(crate) fn fail_enable_for(&self, name: &str) {
        self.fail_enable.lock().unwrap().insert(name.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn with_iface<T>(&self, name: &str, f: impl FnOnce(&mut FakeIface) -> T) -> Option<T> {
        let mut ifaces = self.ifaces.lock().unwrap();
        ifaces.iter_mut().find(|i| i.info.name == name).map(f)
    }
}

impl NetworkPlatform for FakePlatform {
    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, NetworkError> {
        let mut ifaces = self.ifaces.lock().unwrap();
        let mut out = Vec::new();
        for iface in ifaces.iter_mut() {
            if iface.hidden_for > 0 {
                iface.hidden_for -= 1;
                continue;
            }
            if iface.unaddressed_for > 0 {
                iface.unaddressed_for -= 1;
            } else if let Some(addr) = iface.pending_addr.take() {
                iface.info.addresses.push(addr);
            }
            out.push(iface.info.clone());
        }
        Ok(out)
    }

    fn is_started(&self, iface: &InterfaceHandle) -> bool {
        self.with_iface(iface.name(), |i| i.started).unwrap_or(false)
    }

    fn start(&self, iface: &InterfaceHandle) -> Result<(), NetworkError> {
        self.record(format!("start:{}", iface.name()));
        self.with_iface(iface.name(), |i| i.started = true);
        Ok(())
    }

    fn is_enabled(&self, iface: &InterfaceHandle) -> bool {
        self.with_iface(iface.name(), |i| i.info.is_up).unwrap_or(false)
    }

    fn enable(&self, iface: &InterfaceHandle) -> Result<(), NetworkError> {
        self.record(format!("enable:{}", iface.name()));
        if self.fail_enable.lock().unwrap().contains(iface.name()) {
            return Err(NetworkError::platform(iface.name(), "injected enable failure"));
        }
        self.with_iface(iface.name(), |i| i.info.is_up = true);
        Ok(())
    }

    fn configure(&self, iface: &InterfaceHandle, settings: &IpSettings) -> Result<(), NetworkError> {
        self.record(format!("configure:{}:dhcp={}", iface.name(), settings.dhcp));
        Ok(())
    }

    fn ip_configuration(&self, iface: &InterfaceHandle) -> Result<IpConfiguration, NetworkError> {
        let addr = self
            .with_iface(iface.name(), |i| i.info.usable_address().cloned())
            .flatten();
        Ok(IpConfiguration {
            ip: addr.as_ref().map(|a| a.ip),
            netmask: addr.and_then(|a| a.netmask),
            gateway: Some("192.168.1.1".parse().unwrap()),
            dns: vec!["192.168.1.1".parse().unwrap()],
            is_static: false,
        })
    }

    fn set_default(&self, iface: &InterfaceHandle) -> Result<(), NetworkError> {
        self.record(format!("set_default:{}", iface.name()));
        self.route.set(iface.name());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeRadio {
    pub(crate) joins: Mutex<Vec<(String, SecurityMode)>>,
    pub(crate) leaves: Mutex<usize>,
    pub(crate) fail_join: bool,
    pub(crate) report_joined: bool,
    pub(crate) fail_leave: bool,
}

impl WifiRadio for FakeRadio {
    fn join(&self, ssid: &str, _passphrase: &str, security: SecurityMode) -> Result<(), NetworkError> {
        self.joins.lock().unwrap().push((ssid.to_string(), security));
        if self.fail_join {
            return Err(NetworkError::JoinFailed {
                name: "wlan0".into(),
                reason: "injected".into(),
            });
        }
        Ok(())
    }

    fn joined(&self) -> Result<Option<AccessPoint>, NetworkError> {
        let last = self.joins.lock().unwrap().last().map(|(s, _)| s.clone());
        Ok(if self.report_joined {
            last.map(|ssid| AccessPoint { ssid, bssid: None })
        } else {
            None
        })
    }

    fn leave(&self) -> Result<(), NetworkError> {
        *self.leaves.lock().unwrap() += 1;
        if self.fail_leave {
            return Err(NetworkError::platform("wlan0", "injected leave failure"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeModem {
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) fail_activate: bool,
    pub(crate) fail_deactivate: bool,
}

impl FakeModem {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Modem for FakeModem {
    fn unlock_sim(&self, pin: &str) -> Result<(), NetworkError> {
        self.calls.lock().unwrap().push(format!("pin:{}", pin));
        Ok(())
    }

    fn activate_session(&self, apn: &str, _user: &str, _passphrase: &str) -> Result<(), NetworkError> {
        self.calls.lock().unwrap().push(format!("activate:{}", apn));
        if self.fail_activate {
            return Err(NetworkError::JoinFailed {
                name: "wwan0".into(),
                reason: "injected".into(),
            });
        }
        Ok(())
    }

    fn deactivate_session(&self) -> Result<(), NetworkError> {
        self.calls.lock().unwrap().push("deactivate".into());
        if self.fail_deactivate {
            return Err(NetworkError::platform("wwan0", "injected deactivate failure"));
        }
        Ok(())
    }
}
