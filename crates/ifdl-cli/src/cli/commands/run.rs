//! `ifdl run` – bring interfaces up, download, print the verdict.

use anyhow::{Context, Result};
use ifdl_core::config::HarnessConfig;
use ifdl_core::control::CancelToken;
use ifdl_core::orchestrator::{Orchestrator, RunReport, RunSettings};
use ifdl_core::registry::InterfaceRegistry;
use ifdl_core::transport::CurlTransport;
use std::sync::Arc;

use super::host_context;

/// Run the harness off the async runtime; Ctrl-C trips the cancel token.
/// Returns the verdict's exit code.
pub async fn run_harness(cfg: HarnessConfig) -> Result<i32> {
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping workers after their current step");
            on_interrupt.cancel();
        }
    });

    let report = tokio::task::spawn_blocking(move || run_blocking(&cfg, cancel))
        .await
        .context("harness thread panicked")?;
    interrupt.abort();

    println!("{}", report.verdict);
    Ok(report.verdict.exit_code())
}

fn run_blocking(cfg: &HarnessConfig, cancel: CancelToken) -> RunReport {
    let (route, ctx) = host_context(cfg, cancel.clone());
    let interfaces = InterfaceRegistry::for_host(cfg, ctx).load_interfaces();
    tracing::info!("{} network interface(s) loaded", interfaces.len());

    let transport = Arc::new(CurlTransport::new(route));
    Orchestrator::new(RunSettings::from_config(&cfg.download), transport, cancel).run(&interfaces)
}
