use std::sync::{Mutex, MutexGuard, OnceLock};

static DOWNLOAD_GATE: OnceLock<DownloadGate> = OnceLock::new();

/// Serializes "make my interface the default route, then connect" across
/// every worker of every interface. The default route is process state, so
/// a connection must be established before another worker may move it.
#[derive(Debug, Default)]
pub struct DownloadGate {
    lock: Mutex<()>,
}

impl DownloadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide gate.
    pub fn global() -> &'static DownloadGate {
        DOWNLOAD_GATE.get_or_init(DownloadGate::new)
    }

    /// Block until the gate is free. A worker that panicked while holding it
    /// does not poison it for the others.
    pub fn enter(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}
