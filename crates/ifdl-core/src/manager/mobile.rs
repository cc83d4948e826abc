//! Cellular interface: unlocks the SIM, then activates a PDP data session
//! before waiting for the address.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::link::{JoinStep, Link, LinkContext};
use super::{InterfaceKind, ManagerState, NetworkJoinable};
use crate::error::NetworkError;
use crate::platform::{InterfaceHandle, Modem};

/// APN credentials and SIM PIN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MobileCredentials {
    pub apn: String,
    pub user: String,
    pub passphrase: String,
    pub pin_code: String,
}

pub struct MobileManager {
    link: Link,
    modem: Arc<dyn Modem>,
    credentials: MobileCredentials,
    session_active: AtomicBool,
}

impl MobileManager {
    pub fn new(
        interface_name: impl Into<String>,
        modem: Arc<dyn Modem>,
        credentials: MobileCredentials,
        ctx: LinkContext,
    ) -> Self {
        Self {
            link: Link::new(InterfaceKind::Mobile, interface_name, ctx),
            modem,
            credentials,
            session_active: AtomicBool::new(false),
        }
    }
}

impl JoinStep for MobileManager {
    fn prepare(&self, _link: &Link) -> Result<(), NetworkError> {
        self.modem.unlock_sim(&self.credentials.pin_code)
    }

    fn join(&self, _link: &Link, _handle: &InterfaceHandle) -> Result<(), NetworkError> {
        tracing::info!("Joining Mobile Access Point");
        let c = &self.credentials;
        self.modem.activate_session(&c.apn, &c.user, &c.passphrase)?;
        self.session_active.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl NetworkJoinable for MobileManager {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Mobile
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
        if self.session_active.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.modem.deactivate_session() {
                tracing::error!(interface = %self.link.name, error = %e, "PDP session deactivation failed");
            }
        }
        tracing::info!(interface = %self.link.name, "Mobile interface released");
    }

    fn set_default(&self) -> Result<(), NetworkError> {
        self.link.set_default()
    }
}
