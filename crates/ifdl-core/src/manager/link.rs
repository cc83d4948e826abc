//! Bring-up sequence shared by the managed (non-preconfigured) kinds.
//!
//! find interface → start → enable → request DHCP → kind join step → wait
//! for an address → log the IP configuration → kind verification → claim
//! the default route → sync the local clock.

use std::sync::{Arc, Mutex};

use super::{InterfaceKind, ManagerState};
use crate::control::CancelToken;
use crate::error::NetworkError;
use crate::platform::{InterfaceHandle, IpSettings, NetworkPlatform};
use crate::poll::{poll_until, PollPolicy, PollStop, Sleeper};
use crate::retry::RetryPolicy;
use crate::timesync::{sync_local_time, TimeSync};

/// Collaborators every managed interface shares.
#[derive(Clone)]
pub struct LinkContext {
    pub platform: Arc<dyn NetworkPlatform>,
    pub poll: PollPolicy,
    pub sleeper: Arc<dyn Sleeper>,
    pub cancel: CancelToken,
    /// `None` skips clock synchronization.
    pub time_sync: Option<Arc<dyn TimeSync>>,
    pub time_sync_retry: RetryPolicy,
}

/// Kind-specific hooks around the common bring-up.
pub(super) trait JoinStep {
    /// Before the interface is looked up (mobile: SIM unlock).
    fn prepare(&self, _link: &Link) -> Result<(), NetworkError> {
        Ok(())
    }

    /// After DHCP was requested, before waiting for an address.
    fn join(&self, _link: &Link, _handle: &InterfaceHandle) -> Result<(), NetworkError> {
        Ok(())
    }

    /// After an address was assigned.
    fn verify(&self, _link: &Link) -> Result<(), NetworkError> {
        Ok(())
    }
}

const MANUALLY: &str = "manually";
const BY_DHCP: &str = "by DHCP";

/// State and handle of one managed interface.
pub(super) struct Link {
    pub(super) kind: InterfaceKind,
    pub(super) name: String,
    pub(super) ctx: LinkContext,
    handle: Mutex<Option<InterfaceHandle>>,
    state: Mutex<ManagerState>,
}

impl Link {
    pub(super) fn new(kind: InterfaceKind, name: impl Into<String>, ctx: LinkContext) -> Self {
        Self {
            kind,
            name: name.into(),
            ctx,
            handle: Mutex::new(None),
            state: Mutex::new(ManagerState::Uninitialized),
        }
    }

    pub(super) fn state(&self) -> ManagerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, s: ManagerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = s;
    }

    /// Run the full bring-up. A second call on a joined link is a no-op.
    pub(super) fn init_with(&self, step: &dyn JoinStep) -> Result<(), NetworkError> {
        if self.state() == ManagerState::Joined {
            tracing::debug!(interface = %self.name, "already initialized");
            return Ok(());
        }
        self.set_state(ManagerState::Initializing);
        tracing::info!("Initializes the {} network", self.kind);

        match self.bring_up(step) {
            Ok(handle) => {
                *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
                self.set_state(ManagerState::Joined);
                self.sync_time();
                Ok(())
            }
            Err(e) => {
                self.set_state(ManagerState::Failed);
                Err(e)
            }
        }
    }

    fn bring_up(&self, step: &dyn JoinStep) -> Result<InterfaceHandle, NetworkError> {
        step.prepare(self)?;
        let handle = self.find_interface()?;
        let platform = &self.ctx.platform;
        if !platform.is_started(&handle) {
            platform.start(&handle)?;
        }
        if !platform.is_enabled(&handle) {
            platform.enable(&handle)?;
        }
        platform.configure(&handle, &IpSettings::dhcp())?;
        step.join(self, &handle)?;
        self.wait_for_address()?;
        self.log_ip_configuration(&handle);
        step.verify(self)?;
        platform.set_default(&handle)?;
        Ok(handle)
    }

    /// Poll the interface list until `name` shows up.
    fn find_interface(&self) -> Result<InterfaceHandle, NetworkError> {
        tracing::info!("Waiting for {} to be initialized...", self.name);
        let found = poll_until(
            &self.ctx.poll,
            self.ctx.sleeper.as_ref(),
            &self.ctx.cancel,
            || self.listed(|info| Some(info.handle())),
        );
        match found {
            Ok(handle) => {
                tracing::info!("{} initialized!", self.name);
                Ok(handle)
            }
            Err(PollStop::Exhausted) => Err(NetworkError::InterfaceNotFound {
                kind: self.kind.to_string(),
                name: self.name.clone(),
            }),
            Err(PollStop::Cancelled) => Err(NetworkError::Cancelled {
                what: format!("interface {}", self.name),
            }),
        }
    }

    /// Poll until the interface carries a usable address.
    fn wait_for_address(&self) -> Result<(), NetworkError> {
        tracing::info!("Waiting for IP address to be assigned...");
        let assigned = poll_until(
            &self.ctx.poll,
            self.ctx.sleeper.as_ref(),
            &self.ctx.cancel,
            || self.listed(|info| info.usable_address().map(|_| ())),
        );
        match assigned {
            Ok(()) => {
                tracing::info!("IP address assigned!");
                Ok(())
            }
            Err(PollStop::Exhausted) => Err(NetworkError::AddressAssignmentTimeout {
                name: self.name.clone(),
            }),
            Err(PollStop::Cancelled) => Err(NetworkError::Cancelled {
                what: format!("address on {}", self.name),
            }),
        }
    }

    /// Apply `f` to this interface's entry in the current listing. Listing
    /// errors count as "not there yet".
    fn listed<T>(&self, f: impl FnOnce(&crate::platform::InterfaceInfo) -> Option<T>) -> Option<T> {
        match self.ctx.platform.interfaces() {
            Ok(list) => list.iter().find(|i| i.name == self.name).and_then(f),
            Err(e) => {
                tracing::debug!(interface = %self.name, error = %e, "interface listing failed");
                None
            }
        }
    }

    fn log_ip_configuration(&self, handle: &InterfaceHandle) {
        let cfg = match self.ctx.platform.ip_configuration(handle) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(interface = %self.name, error = %e, "could not read IP configuration");
                return;
            }
        };
        let how = if cfg.is_static { MANUALLY } else { BY_DHCP };
        let show = |a: Option<std::net::IpAddr>| a.map(|a| a.to_string()).unwrap_or_else(|| "-".into());
        tracing::info!("My IP address: {} (assigned {})", show(cfg.ip), how);
        tracing::info!("My netmask: {} (assigned {})", show(cfg.netmask), how);
        tracing::info!("My gateway: {} (assigned {})", show(cfg.gateway), how);
        tracing::info!("My DNS list (assigned {}):", how);
        for dns in &cfg.dns {
            tracing::info!("    * {}", dns);
        }
    }

    fn sync_time(&self) {
        if let Some(sync) = &self.ctx.time_sync {
            sync_local_time(
                sync.as_ref(),
                &self.ctx.time_sync_retry,
                self.ctx.sleeper.as_ref(),
            );
        }
    }

    pub(super) fn set_default(&self) -> Result<(), NetworkError> {
        let guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        let handle = guard.as_ref().ok_or_else(|| NetworkError::NoInterface {
            name: self.name.clone(),
        })?;
        self.ctx.platform.set_default(handle)
    }

    /// Drop the handle and mark the link deinitialized. Returns false when
    /// there was nothing to tear down (never initialized, or already done).
    pub(super) fn release(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            ManagerState::Uninitialized | ManagerState::Deinitialized => false,
            _ => {
                *state = ManagerState::Deinitialized;
                self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
                true
            }
        }
    }
}
