//! Wi-Fi interface: associates with an access point after DHCP is
//! requested, and verifies the association once an address is assigned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::link::{JoinStep, Link, LinkContext};
use super::{InterfaceKind, ManagerState, NetworkJoinable};
use crate::error::NetworkError;
use crate::platform::{InterfaceHandle, SecurityMode, WifiRadio};

/// Access point credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub passphrase: String,
    pub security: SecurityMode,
}

pub struct WifiManager {
    link: Link,
    radio: Arc<dyn WifiRadio>,
    credentials: WifiCredentials,
    /// Set once `join` was issued; `deinit` leaves only then.
    associated: AtomicBool,
}

impl WifiManager {
    pub fn new(
        interface_name: impl Into<String>,
        radio: Arc<dyn WifiRadio>,
        credentials: WifiCredentials,
        ctx: LinkContext,
    ) -> Self {
        Self {
            link: Link::new(InterfaceKind::Wifi, interface_name, ctx),
            radio,
            credentials,
            associated: AtomicBool::new(false),
        }
    }
}

impl JoinStep for WifiManager {
    fn join(&self, _link: &Link, _handle: &InterfaceHandle) -> Result<(), NetworkError> {
        tracing::info!("Joining Wi-Fi Access Point");
        self.associated.store(true, Ordering::SeqCst);
        let c = &self.credentials;
        self.radio.join(&c.ssid, &c.passphrase, c.security)
    }

    fn verify(&self, link: &Link) -> Result<(), NetworkError> {
        match self.radio.joined()? {
            Some(ap) => {
                tracing::info!(ssid = %ap.ssid, "Access Point joined");
                Ok(())
            }
            None => Err(NetworkError::JoinFailed {
                name: link.name.clone(),
                reason: "Access Point not joined".into(),
            }),
        }
    }
}

impl NetworkJoinable for WifiManager {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Wifi
    }

    fn name(&self) -> &str {
        &self.link.name
    }

    fn state(&self) -> ManagerState {
        self.link.state()
    }

    fn init(&self) -> Result<(), NetworkError> {
        self.link.init_with(self)
    }

    fn deinit(&self) {
        if !self.link.release() {
            return;
        }
        if self.associated.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.radio.leave() {
                tracing::error!(interface = %self.link.name, error = %e, "leaving access point failed");
            }
        }
        tracing::info!(interface = %self.link.name, "Wi-Fi interface released");
    }

    fn set_default(&self) -> Result<(), NetworkError> {
        self.link.set_default()
    }
}
