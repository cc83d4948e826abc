//! Download workers: repeatedly fetch the resource through one interface and
//! verify its CRC-32.
//!
//! Each iteration takes the process-wide [`DownloadGate`], makes the
//! worker's interface the default route, opens the connection and checks the
//! status, then releases the gate before streaming the body.

mod gate;
mod progress;

pub use gate::DownloadGate;
pub use progress::ProgressTracker;

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use crate::checksum::{self, Checksum32, Crc32};
use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::manager::NetworkJoinable;
use crate::transport::{classify, FailureKind, RequestOptions, ResourceResponse, ResourceTransport};

/// Body read size.
pub const CHUNK_SIZE: usize = 4096;

/// What every worker of one interface downloads. Shared read-only.
pub struct DownloadJob {
    pub manager: Arc<dyn NetworkJoinable>,
    pub url: String,
    pub expected_crc32: String,
    pub iterations: u32,
    pub log_info_every: u32,
    pub progress_step: u32,
}

/// Result of one iteration.
#[derive(Debug, Default)]
pub struct DownloadOutcome {
    pub bytes_transferred: u64,
    pub computed_checksum: Option<String>,
    pub success: bool,
    pub error: Option<DownloadError>,
}

/// Per-worker tallies, logged when the worker finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: String,
    pub iterations: u32,
    pub passed: u32,
    pub failed: u32,
    pub bytes: u64,
    pub failures: BTreeMap<FailureKind, u32>,
}

impl WorkerReport {
    fn new(worker: &str) -> Self {
        Self {
            worker: worker.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &DownloadOutcome) {
        self.iterations += 1;
        self.bytes += outcome.bytes_transferred;
        if outcome.success {
            self.passed += 1;
        } else {
            self.failed += 1;
            if let Some(e) = &outcome.error {
                *self.failures.entry(classify(e)).or_insert(0) += 1;
            }
        }
    }
}

pub struct DownloadWorker {
    name: String,
    job: Arc<DownloadJob>,
    transport: Arc<dyn ResourceTransport>,
    options: RequestOptions,
    gate: &'static DownloadGate,
    cancel: CancelToken,
}

impl DownloadWorker {
    pub fn new(
        name: impl Into<String>,
        job: Arc<DownloadJob>,
        transport: Arc<dyn ResourceTransport>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            name: name.into(),
            job,
            transport,
            options: RequestOptions::default(),
            gate: DownloadGate::global(),
            cancel,
        }
    }

    pub fn with_gate(mut self, gate: &'static DownloadGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run every iteration, stopping early only on cancellation.
    pub fn run(&self) -> WorkerReport {
        let mut report = WorkerReport::new(&self.name);
        for iteration in 1..=self.job.iterations {
            if self.cancel.is_cancelled() {
                tracing::info!(worker = %self.name, iteration, "cancelled, stopping");
                break;
            }
            let sampled = logs_at_info(iteration, self.job.log_info_every);
            if sampled {
                tracing::info!(worker = %self.name, "Trying to download file (iteration = {}) ...", iteration);
            } else {
                tracing::debug!(worker = %self.name, "Trying to download file (iteration = {}) ...", iteration);
            }

            let outcome = self.download_once();
            report.record(&outcome);
            match &outcome.error {
                None if sampled => {
                    tracing::info!(worker = %self.name, "File downloaded (iteration = {})", iteration)
                }
                None => {
                    tracing::debug!(worker = %self.name, "File downloaded (iteration = {})", iteration)
                }
                Some(e) => tracing::error!(
                    worker = %self.name,
                    iteration,
                    kind = %classify(e),
                    "{}",
                    e
                ),
            }
        }
        tracing::info!(
            worker = %self.name,
            iterations = report.iterations,
            passed = report.passed,
            failed = report.failed,
            bytes = report.bytes,
            "worker finished"
        );
        report
    }

    /// One download. Never panics on network or content errors; they end up
    /// in `DownloadOutcome::error`.
    pub fn download_once(&self) -> DownloadOutcome {
        let mut outcome = DownloadOutcome::default();
        let result = self
            .connect()
            .and_then(|response| self.stream(response, &mut outcome));
        match result {
            Ok(()) => outcome.success = true,
            Err(e) => outcome.error = Some(e),
        }
        outcome
    }

    /// Route and connect under the gate; the guard drops on return.
    fn connect(&self) -> Result<Box<dyn ResourceResponse>, DownloadError> {
        let _gate = self.gate.enter();
        self.job.manager.set_default()?;
        let response = self.transport.open(&self.job.url, &self.options)?;
        if response.status() != 200 {
            return Err(DownloadError::HttpStatus(response.status()));
        }
        Ok(response)
    }

    fn stream(
        &self,
        mut response: Box<dyn ResourceResponse>,
        outcome: &mut DownloadOutcome,
    ) -> Result<(), DownloadError> {
        let content_length = response.content_length();
        for name in ["Content-Type", "Content-Disposition", "Content-Length"] {
            tracing::debug!(
                worker = %self.name,
                "{} = {}",
                name,
                response.header(name).unwrap_or("null")
            );
        }

        let mut crc = Crc32::new();
        let mut progress = ProgressTracker::new(content_length, self.job.progress_step);
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            self.cancel.check().map_err(|_| DownloadError::Cancelled)?;
            let n = response.read(&mut buf)?;
            if n == 0 {
                break;
            }
            crc.update(&buf[..n]);
            outcome.bytes_transferred += n as u64;
            if let Some(pct) = progress.advance(outcome.bytes_transferred) {
                tracing::debug!(worker = %self.name, "Progress = {}%", pct);
            }
        }

        let computed = crc.padded_hex();
        outcome.computed_checksum = Some(computed.clone());
        if checksum::matches_expected(&self.job.expected_crc32, &computed) {
            tracing::debug!(worker = %self.name, "CRC32 match [{}]", computed);
            Ok(())
        } else {
            Err(DownloadError::ChecksumMismatch {
                expected: self.job.expected_crc32.trim().to_ascii_lowercase(),
                computed,
            })
        }
    }
}

/// Iterations are 1-based; the first one and every `every`-th after it log
/// at INFO.
fn logs_at_info(iteration: u32, every: u32) -> bool {
    iteration.saturating_sub(1) % every.max(1) == 0
}
