//! Interface configured outside the process. The manager never owns it:
//! `init` and `deinit` only track state, `set_default` still routes to it.

use std::sync::{Arc, Mutex};

use super::{InterfaceKind, ManagerState, NetworkJoinable};
use crate::error::NetworkError;
use crate::platform::{InterfaceHandle, NetworkPlatform};

pub struct PreconfiguredManager {
    handle: InterfaceHandle,
    platform: Arc<dyn NetworkPlatform>,
    state: Mutex<ManagerState>,
}

impl PreconfiguredManager {
    pub fn new(handle: InterfaceHandle, platform: Arc<dyn NetworkPlatform>) -> Self {
        Self {
            handle,
            platform,
            state: Mutex::new(ManagerState::Uninitialized),
        }
    }
}

impl NetworkJoinable for PreconfiguredManager {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Preconfigured
    }

    fn name(&self) -> &str {
        self.handle.name()
    }

    fn state(&self) -> ManagerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init(&self) -> Result<(), NetworkError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ManagerState::Joined;
        Ok(())
    }

    fn deinit(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == ManagerState::Joined {
            *state = ManagerState::Deinitialized;
        }
    }

    fn set_default(&self) -> Result<(), NetworkError> {
        self.platform.set_default(&self.handle)
    }
}
