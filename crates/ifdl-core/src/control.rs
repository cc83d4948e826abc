//! Run control: a shared cancellation token.
//!
//! The orchestrator hands one token to every manager and worker. The CLI trips
//! it on Ctrl-C; workers check it at the top of each iteration and the polling
//! loops check it between sleeps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error returned when a wait or a run is stopped by the user.
#[derive(Debug)]
pub struct RunCancelled;

impl std::fmt::Display for RunCancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run cancelled by user")
    }
}

impl std::error::Error for RunCancelled {}

/// Cloneable cancellation flag. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), RunCancelled> {
        if self.is_cancelled() {
            Err(RunCancelled)
        } else {
            Ok(())
        }
    }
}
