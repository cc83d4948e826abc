//! Integration test: curl transport, workers and a full run against a local
//! HTTP server.

mod common;

use std::io::Read;
use std::sync::Arc;

use ifdl_core::checksum::{Checksum32, Crc32};
use ifdl_core::control::CancelToken;
use ifdl_core::transport::{CurlTransport, RequestOptions, ResourceTransport};
use ifdl_core::platform::DefaultRoute;

fn body() -> Vec<u8> {
    (0u8..100).cycle().take(64 * 1024 + 17).collect()
}

fn crc_of(bytes: &[u8]) -> String {
    let mut crc = Crc32::new();
    crc.update(bytes);
    crc.padded_hex()
}

#[test]
fn curl_transport_streams_body_and_sends_harness_headers() {
    let body = body();
    let server = common::http_server::start(body.clone(), 200);
    let transport = CurlTransport::new(DefaultRoute::new());

    let mut response = transport
        .open(&server.url("blob"), &RequestOptions::default())
        .expect("open");
    assert_eq!(response.status(), 200);
    assert_eq!(response.content_length(), Some(body.len() as u64));
    assert_eq!(
        response.header("content-disposition"),
        Some("attachment; filename=\"blob.bin\"")
    );

    let mut received = Vec::new();
    response.read_to_end(&mut received).expect("read body");
    assert_eq!(received, body);

    let request = &server.requests()[0];
    assert!(request.starts_with("GET /blob HTTP/1.1"));
    assert!(request.contains("User-Agent: Mozilla"));
    assert!(request.contains("Connection: Keep-Alive"));
}

#[test]
fn curl_transport_follows_redirects() {
    let body = body();
    let server = common::http_server::start(body.clone(), 200);
    let transport = CurlTransport::new(DefaultRoute::new());

    let mut response = transport
        .open(&server.url("moved"), &RequestOptions::default())
        .expect("open");
    assert_eq!(response.status(), 200);
    let mut received = Vec::new();
    response.read_to_end(&mut received).unwrap();
    assert_eq!(crc_of(&received), crc_of(&body));
}

#[test]
fn error_status_is_visible_before_the_body() {
    let server = common::http_server::start(b"maintenance".to_vec(), 503);
    let transport = CurlTransport::new(DefaultRoute::new());
    let response = transport
        .open(&server.url("blob"), &RequestOptions::default())
        .expect("open");
    assert_eq!(response.status(), 503);
    // Dropping the response mid-transfer must not hang.
    drop(response);
}

#[cfg(target_os = "linux")]
mod over_loopback_interface {
    use super::*;
    use ifdl_core::manager::{LinkContext, NetworkJoinable, PreconfiguredManager};
    use ifdl_core::orchestrator::{Orchestrator, RunSettings, RunVerdict};
    use ifdl_core::platform::host::HostPlatform;
    use ifdl_core::platform::{InterfaceHandle, NetworkPlatform};
    use ifdl_core::poll::{PollPolicy, ThreadSleeper};
    use ifdl_core::registry::InterfaceRegistry;
    use ifdl_core::retry::RetryPolicy;
    use ifdl_core::worker::{DownloadJob, DownloadWorker};

    fn settings(url: String, crc: String) -> RunSettings {
        RunSettings {
            url,
            expected_crc32: crc,
            workers_per_interface: 2,
            iterations: 3,
            log_info_every: 2,
            progress_step: 20,
            request: RequestOptions::default(),
        }
    }

    fn loopback_registry(route: &DefaultRoute, list: &str) -> InterfaceRegistry {
        let platform: Arc<dyn NetworkPlatform> = Arc::new(HostPlatform::new(route.clone()));
        let ctx = LinkContext {
            platform,
            poll: PollPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            cancel: CancelToken::new(),
            time_sync: None,
            time_sync_retry: RetryPolicy::default(),
        };
        InterfaceRegistry::new(ctx, list)
    }

    #[test]
    fn worker_downloads_through_default_route() {
        let body = body();
        let server = common::http_server::start(body.clone(), 200);
        let route = DefaultRoute::new();
        let platform = Arc::new(HostPlatform::new(route.clone()));
        let manager: Arc<dyn NetworkJoinable> =
            Arc::new(PreconfiguredManager::new(InterfaceHandle::new("lo", 1), platform));
        manager.init().unwrap();

        let job = Arc::new(DownloadJob {
            manager,
            url: server.url("blob"),
            expected_crc32: crc_of(&body).to_uppercase(),
            iterations: 2,
            log_info_every: 1,
            progress_step: 10,
        });
        let worker = DownloadWorker::new(
            "lo-worker-1",
            job,
            Arc::new(CurlTransport::new(route.clone())),
            CancelToken::new(),
        );

        let report = worker.run();

        assert_eq!(report.passed, 2, "{:?}", report);
        assert_eq!(report.bytes, 2 * body.len() as u64);
        assert_eq!(route.current().as_deref(), Some("lo"));
    }

    #[test]
    fn full_run_skips_absent_interfaces_and_passes() {
        let body = body();
        let server = common::http_server::start(body.clone(), 200);
        let route = DefaultRoute::new();
        let interfaces = loopback_registry(&route, "lo,ghost0").load_interfaces();
        assert_eq!(interfaces.len(), 1);

        let orch = Orchestrator::new(
            settings(server.url("blob"), crc_of(&body)),
            Arc::new(CurlTransport::new(route)),
            CancelToken::new(),
        );
        let report = orch.run(&interfaces);

        assert_eq!(report.verdict, RunVerdict::Passed);
        assert_eq!(report.workers.len(), 2);
        assert_eq!(report.passed(), 6);
        assert_eq!(server.requests().len(), 6);
    }

    #[test]
    fn checksum_mismatch_fails_iterations_not_the_run() {
        let server = common::http_server::start(body(), 200);
        let route = DefaultRoute::new();
        let interfaces = loopback_registry(&route, "lo").load_interfaces();

        let orch = Orchestrator::new(
            settings(server.url("blob"), "ffffffff".into()),
            Arc::new(CurlTransport::new(route)),
            CancelToken::new(),
        );
        let report = orch.run(&interfaces);

        assert_eq!(report.verdict, RunVerdict::Passed);
        assert_eq!(report.failed_iterations(), 6);
    }
}
