//! Interface managers: one per configured network interface.
//!
//! Every kind exposes the same [`NetworkJoinable`] capability. `init` brings
//! the interface up and joins its network, `set_default` claims the
//! process-wide default route for it, and `deinit` tears down whatever
//! association or session the manager owns.

mod ethernet;
mod link;
mod mobile;
mod preconfigured;
mod wifi;

pub use ethernet::EthernetManager;
pub use link::LinkContext;
pub use mobile::{MobileCredentials, MobileManager};
pub use preconfigured::PreconfiguredManager;
pub use wifi::{WifiCredentials, WifiManager};

use std::fmt;

use crate::error::NetworkError;

/// Which kind of network an interface manager drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceKind {
    /// Configured outside the process; nothing to join.
    Preconfigured,
    Mobile,
    Ethernet,
    Wifi,
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterfaceKind::Preconfigured => "pre-configured",
            InterfaceKind::Mobile => "Mobile",
            InterfaceKind::Ethernet => "Ethernet",
            InterfaceKind::Wifi => "Wi-Fi",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Initializing,
    /// Joined and able to become the default route.
    Joined,
    /// `init` returned an error; `deinit` still cleans up.
    Failed,
    Deinitialized,
}

/// The capability the harness needs from a network interface.
pub trait NetworkJoinable: Send + Sync {
    fn kind(&self) -> InterfaceKind;
    fn name(&self) -> &str;
    fn state(&self) -> ManagerState;
    fn init(&self) -> Result<(), NetworkError>;
    /// Idempotent; logs teardown failures instead of returning them.
    fn deinit(&self);
    fn set_default(&self) -> Result<(), NetworkError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use super::LinkContext;
    use crate::control::CancelToken;
    use crate::platform::fake::FakePlatform;
    use crate::poll::testing::CountingSleeper;
    use crate::poll::PollPolicy;
    use crate::retry::RetryPolicy;
    use crate::timesync::testing::FlakyClock;

    pub(crate) struct Rig {
        pub(crate) platform: Arc<FakePlatform>,
        pub(crate) sleeper: Arc<CountingSleeper>,
        pub(crate) clock: Arc<FlakyClock>,
        pub(crate) ctx: LinkContext,
    }

    /// Context over a fake platform with instant sleeps and an optional ceiling.
    pub(crate) fn rig(max_wait: Option<Duration>) -> Rig {
        let platform = Arc::new(FakePlatform::new());
        let sleeper = Arc::new(CountingSleeper::default());
        let clock = Arc::new(FlakyClock::failing(0));
        let ctx = LinkContext {
            platform: platform.clone(),
            poll: PollPolicy {
                interval: Duration::from_secs(1),
                max_wait,
            },
            sleeper: sleeper.clone(),
            cancel: CancelToken::new(),
            time_sync: Some(clock.clone()),
            time_sync_retry: RetryPolicy {
                base_delay: Duration::ZERO,
                ..RetryPolicy::default()
            },
        };
        Rig {
            platform,
            sleeper,
            clock,
            ctx,
        }
    }
}
