//! Fixed-interval polling for hardware bring-up.
//!
//! Interface discovery and address assignment wait on the platform with a
//! fixed sleep between checks. By default the wait is unbounded; a ceiling
//! can be configured. The sleep is injected so tests run without delay.

use std::time::Duration;

use crate::control::CancelToken;

/// Default delay between two checks of the platform interface list.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Blocking sleep, swappable in tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, d: Duration);
}

/// Real `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// How often to poll and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits forever.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

/// Why [`poll_until`] gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStop {
    /// The configured ceiling was reached.
    Exhausted,
    Cancelled,
}

/// Calls `check` until it yields `Some`, sleeping `policy.interval` between
/// calls. Elapsed time is counted in slept intervals, not wall-clock, so a
/// slow `check` does not eat into the ceiling.
pub fn poll_until<T, F>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    cancel: &CancelToken,
    mut check: F,
) -> Result<T, PollStop>
where
    F: FnMut() -> Option<T>,
{
    let mut waited = Duration::ZERO;
    loop {
        if cancel.is_cancelled() {
            return Err(PollStop::Cancelled);
        }
        if let Some(v) = check() {
            return Ok(v);
        }
        if let Some(max) = policy.max_wait {
            if waited >= max {
                return Err(PollStop::Exhausted);
            }
        }
        sleeper.sleep(policy.interval);
        waited = waited.saturating_add(policy.interval);
    }
}
