//! Runs the harness: bring every interface up, start all workers at once,
//! wait for them, tear everything down and decide the verdict.
//!
//! The verdict reflects interface bring-up and whether the run was allowed to
//! finish. Download failures are logged and tallied but never fail the run;
//! a cancelled run does.

use std::fmt;
use std::sync::Arc;
use std::thread;

use crate::config::DownloadConfig;
use crate::control::CancelToken;
use crate::manager::NetworkJoinable;
use crate::transport::{RequestOptions, ResourceTransport};
use crate::worker::{DownloadGate, DownloadJob, DownloadWorker, WorkerReport};

/// Download parameters shared by every worker of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub url: String,
    pub expected_crc32: String,
    pub workers_per_interface: usize,
    pub iterations: u32,
    pub log_info_every: u32,
    pub progress_step: u32,
    pub request: RequestOptions,
}

impl RunSettings {
    pub fn from_config(download: &DownloadConfig) -> Self {
        Self {
            url: download.url.clone(),
            expected_crc32: download.crc32.clone(),
            workers_per_interface: download.workers_per_interface,
            iterations: download.iterations,
            log_info_every: download.log_info_every,
            progress_step: download.progress_step_percent,
            request: RequestOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunVerdict {
    Passed,
    Failed,
}

impl RunVerdict {
    pub fn exit_code(self) -> i32 {
        match self {
            RunVerdict::Passed => 0,
            RunVerdict::Failed => 1,
        }
    }
}

impl fmt::Display for RunVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunVerdict::Passed => f.write_str("PASSED: 1"),
            RunVerdict::Failed => f.write_str("FAILED: 1 failures, 0 errors, out of 1 runs."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub verdict: RunVerdict,
    pub workers: Vec<WorkerReport>,
    /// Workers whose thread panicked.
    pub panicked: usize,
    /// Workers whose thread could not be started.
    pub not_started: usize,
}

impl RunReport {
    fn empty(verdict: RunVerdict) -> Self {
        Self {
            verdict,
            workers: Vec::new(),
            panicked: 0,
            not_started: 0,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.workers.iter().map(|w| w.iterations).sum()
    }

    pub fn passed(&self) -> u32 {
        self.workers.iter().map(|w| w.passed).sum()
    }

    pub fn failed_iterations(&self) -> u32 {
        self.workers.iter().map(|w| w.failed).sum()
    }

    pub fn bytes(&self) -> u64 {
        self.workers.iter().map(|w| w.bytes).sum()
    }
}

pub struct Orchestrator {
    settings: RunSettings,
    transport: Arc<dyn ResourceTransport>,
    cancel: CancelToken,
    gate: &'static DownloadGate,
}

impl Orchestrator {
    pub fn new(settings: RunSettings, transport: Arc<dyn ResourceTransport>, cancel: CancelToken) -> Self {
        Self {
            settings,
            transport,
            cancel,
            gate: DownloadGate::global(),
        }
    }

    pub fn with_gate(mut self, gate: &'static DownloadGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn run(&self, interfaces: &[Arc<dyn NetworkJoinable>]) -> RunReport {
        if interfaces.is_empty() {
            tracing::warn!("no network interface registered, nothing to download");
            return RunReport::empty(RunVerdict::Passed);
        }

        for manager in interfaces {
            if let Err(e) = manager.init() {
                tracing::error!(
                    "Network initialization failed on {} ({}): {}",
                    manager.name(),
                    manager.kind(),
                    e
                );
                deinit_all(interfaces);
                return RunReport::empty(RunVerdict::Failed);
            }
        }

        let handles = self.spawn_workers(interfaces);
        let mut report = RunReport {
            workers: Vec::with_capacity(handles.len()),
            ..RunReport::empty(RunVerdict::Passed)
        };
        for (name, handle) in handles {
            let end = match handle {
                Some(handle) => match handle.join() {
                    Ok(worker) => WorkerEnd::Finished(worker),
                    Err(_) => WorkerEnd::Panicked,
                },
                None => WorkerEnd::NotStarted,
            };
            self.settle(&mut report, name, end);
        }

        if self.cancel.is_cancelled() {
            tracing::warn!(
                iterations = report.iterations(),
                "run cancelled before all iterations completed"
            );
            report.verdict = RunVerdict::Failed;
        }

        deinit_all(interfaces);
        tracing::info!(
            workers = report.workers.len(),
            iterations = report.iterations(),
            passed = report.passed(),
            failed = report.failed_iterations(),
            bytes = report.bytes(),
            panicked = report.panicked,
            not_started = report.not_started,
            "download run finished"
        );
        report
    }

    /// Fold one worker's end into the report. A worker that panicked or never
    /// started counts as having failed every iteration.
    fn settle(&self, report: &mut RunReport, name: String, end: WorkerEnd) {
        match end {
            WorkerEnd::Finished(worker) => {
                report.workers.push(worker);
                return;
            }
            WorkerEnd::Panicked => {
                tracing::error!(worker = %name, "worker thread panicked");
                report.panicked += 1;
            }
            WorkerEnd::NotStarted => report.not_started += 1,
        }
        report.workers.push(WorkerReport {
            worker: name,
            iterations: self.settings.iterations,
            failed: self.settings.iterations,
            ..WorkerReport::default()
        });
    }

    /// One named thread per (interface, worker) pair, all started before any
    /// is joined.
    fn spawn_workers(
        &self,
        interfaces: &[Arc<dyn NetworkJoinable>],
    ) -> Vec<(String, Option<thread::JoinHandle<WorkerReport>>)> {
        let mut handles = Vec::new();
        for manager in interfaces {
            let job = Arc::new(DownloadJob {
                manager: manager.clone(),
                url: self.settings.url.clone(),
                expected_crc32: self.settings.expected_crc32.clone(),
                iterations: self.settings.iterations,
                log_info_every: self.settings.log_info_every,
                progress_step: self.settings.progress_step,
            });
            for n in 1..=self.settings.workers_per_interface {
                let name = format!("{}-worker-{}", manager.name(), n);
                let worker = DownloadWorker::new(
                    name.clone(),
                    job.clone(),
                    self.transport.clone(),
                    self.cancel.clone(),
                )
                .with_gate(self.gate)
                .with_options(self.settings.request.clone());
                match thread::Builder::new().name(name.clone()).spawn(move || worker.run()) {
                    Ok(handle) => handles.push((name, Some(handle))),
                    Err(e) => {
                        tracing::error!(worker = %name, error = %e, "cannot start worker thread");
                        handles.push((name, None));
                    }
                }
            }
        }
        tracing::info!(
            "{} download workers started",
            handles.iter().filter(|(_, h)| h.is_some()).count()
        );
        handles
    }
}

enum WorkerEnd {
    Finished(WorkerReport),
    Panicked,
    NotStarted,
}

fn deinit_all(interfaces: &[Arc<dyn NetworkJoinable>]) {
    for manager in interfaces {
        manager.deinit();
    }
}
