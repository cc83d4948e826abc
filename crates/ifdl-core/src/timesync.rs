//! Local clock synchronization after an interface joins.
//!
//! A failed sync is never fatal: each failed attempt that will be retried is
//! logged at WARN, the final failure once at ERROR, and `init()` carries on.

use std::net::UdpSocket;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::TimeSyncError;
use crate::platform::host::bind_to_device;
use crate::platform::DefaultRoute;
use crate::poll::Sleeper;
use crate::retry::{run_with_retry, RetryDecision, RetryPolicy};

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;
const SNTP_PACKET_LEN: usize = 48;

/// Something that can bring the local clock in line with a reference.
pub trait TimeSync: Send + Sync {
    /// Returns the measured offset of the reference clock from the local one,
    /// in milliseconds (positive = local clock is behind).
    fn update_local_time(&self) -> Result<i64, TimeSyncError>;
}

/// Try `sync` up to `policy.max_attempts` times. Returns true on success.
pub fn sync_local_time(sync: &dyn TimeSync, policy: &RetryPolicy, sleeper: &dyn Sleeper) -> bool {
    let res = run_with_retry(
        policy,
        sleeper,
        |_| sync.update_local_time(),
        |attempt, err, decision| match decision {
            RetryDecision::RetryAfter(_) => {
                tracing::warn!(attempt, error = %err, "Time update failed, will retry");
            }
            RetryDecision::NoRetry => {
                tracing::error!(error = %err, "Time update failed {} times", attempt);
            }
        },
    );
    match res {
        Ok(offset_ms) => {
            tracing::info!(offset_ms, "Time updated");
            true
        }
        Err(_) => false,
    }
}

/// SNTP (RFC 4330) client measuring the local clock offset.
///
/// Setting the system clock needs privileges the harness does not assume;
/// the offset is measured and reported. With a [`DefaultRoute`] attached, the
/// request leaves through whichever interface was made default last.
#[derive(Debug, Clone)]
pub struct SntpClient {
    server: String,
    timeout: Duration,
    route: Option<DefaultRoute>,
}

impl SntpClient {
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            timeout,
            route: None,
        }
    }

    pub fn with_route(mut self, route: DefaultRoute) -> Self {
        self.route = Some(route);
        self
    }

    fn open_socket(&self) -> Result<UdpSocket, TimeSyncError> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| self.io_err(e))?;
        if let Some(name) = self.route.as_ref().and_then(DefaultRoute::current) {
            bind_to_device(&socket, &name).map_err(|e| self.io_err(e))?;
            tracing::debug!(interface = %name, server = %self.server, "time request bound to interface");
        }
        socket
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| self.io_err(e))?;
        Ok(socket)
    }

    fn io_err(&self, source: std::io::Error) -> TimeSyncError {
        TimeSyncError::Io {
            server: self.server.clone(),
            source,
        }
    }
}

impl TimeSync for SntpClient {
    fn update_local_time(&self) -> Result<i64, TimeSyncError> {
        let socket = self.open_socket()?;
        socket
            .connect(self.server.as_str())
            .map_err(|e| self.io_err(e))?;

        let sent_at = unix_millis(SystemTime::now());
        socket.send(&request_packet()).map_err(|e| self.io_err(e))?;
        let mut buf = [0u8; SNTP_PACKET_LEN];
        let n = socket.recv(&mut buf).map_err(|e| self.io_err(e))?;
        let received_at = unix_millis(SystemTime::now());

        let server_ms = parse_transmit_millis(&buf[..n]).map_err(|reason| {
            TimeSyncError::InvalidReply {
                server: self.server.clone(),
                reason,
            }
        })?;
        let local_mid = sent_at + (received_at - sent_at) / 2;
        Ok(server_ms - local_mid)
    }
}

/// Client request: LI=0, VN=4, Mode=3.
fn request_packet() -> [u8; SNTP_PACKET_LEN] {
    let mut p = [0u8; SNTP_PACKET_LEN];
    p[0] = 0b00_100_011;
    p
}

/// Server transmit timestamp as Unix milliseconds.
fn parse_transmit_millis(reply: &[u8]) -> Result<i64, String> {
    if reply.len() < SNTP_PACKET_LEN {
        return Err(format!("short packet ({} bytes)", reply.len()));
    }
    let mode = reply[0] & 0b111;
    if mode != 4 && mode != 5 {
        return Err(format!("unexpected mode {}", mode));
    }
    if reply[1] == 0 {
        return Err("kiss-of-death (stratum 0)".into());
    }
    let secs = u32::from_be_bytes([reply[40], reply[41], reply[42], reply[43]]) as u64;
    let frac = u32::from_be_bytes([reply[44], reply[45], reply[46], reply[47]]) as u64;
    if secs < NTP_UNIX_OFFSET {
        return Err("transmit timestamp before 1970".into());
    }
    let millis = (secs - NTP_UNIX_OFFSET) * 1000 + ((frac * 1000) >> 32);
    Ok(millis as i64)
}

fn unix_millis(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
