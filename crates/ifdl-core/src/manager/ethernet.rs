//! Wired interface: DHCP only, no join step.

use super::link::{JoinStep, Link, LinkContext};
use super::{InterfaceKind, ManagerState, NetworkJoinable};
use crate::error::NetworkError;

struct NoJoin;

impl JoinStep for NoJoin {}

pub struct EthernetManager {
    link: Link,
}

impl EthernetManager {
    pub fn new(interface_name: impl Into<String>, ctx: LinkContext) -> Self {
        Self {
            link: Link::new(InterfaceKind::Ethernet, interface_name, ctx),
        }
    }
}

impl NetworkJoinable for EthernetManager {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Ethernet
    }

    fn name(&self) -> &str {
        &self.link.name
    }

    fn state(&self) -> ManagerState {
        self.link.state()
    }

    fn init(&self) -> Result<(), NetworkError> {
        self.link.init_with(&NoJoin)
    }

    fn deinit(&self) {
        if self.link.release() {
            tracing::info!(interface = %self.link.name, "Ethernet interface released");
        }
    }

    fn set_default(&self) -> Result<(), NetworkError> {
        self.link.set_default()
    }
}
