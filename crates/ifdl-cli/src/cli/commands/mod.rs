//! CLI command handlers. Each command is in its own file.

mod checksum;
mod interfaces;
mod run;

pub use checksum::run_checksum;
pub use interfaces::run_interfaces;
pub use run::run_harness;

use ifdl_core::config::HarnessConfig;
use ifdl_core::control::CancelToken;
use ifdl_core::manager::LinkContext;
use ifdl_core::platform::host::HostPlatform;
use ifdl_core::platform::DefaultRoute;
use ifdl_core::poll::ThreadSleeper;
use ifdl_core::timesync::SntpClient;
use std::sync::Arc;

/// Manager context over the running host. Returns the default-route slot the
/// HTTP transport must share with the platform and the time client.
pub(crate) fn host_context(cfg: &HarnessConfig, cancel: CancelToken) -> (DefaultRoute, LinkContext) {
    let route = DefaultRoute::new();
    let sntp = SntpClient::new(cfg.time_sync.server.clone(), cfg.time_sync.timeout())
        .with_route(route.clone());
    let ctx = LinkContext {
        platform: Arc::new(HostPlatform::new(route.clone())),
        poll: cfg.network.poll_policy(),
        sleeper: Arc::new(ThreadSleeper),
        cancel,
        time_sync: Some(Arc::new(sntp)),
        time_sync_retry: cfg.time_sync.retry_policy(),
    };
    (route, ctx)
}
