//! Classify download failures for the per-worker tallies.

use std::fmt;

use crate::error::DownloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// Could not select the worker's interface.
    Route,
    /// Connect or read timed out.
    Timeout,
    /// Network-level failure (refused, reset, DNS, ...).
    Connection,
    /// Status other than 200.
    Status,
    Checksum,
    Cancelled,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Route => "route",
            FailureKind::Timeout => "timeout",
            FailureKind::Connection => "connection",
            FailureKind::Status => "status",
            FailureKind::Checksum => "checksum",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Other => "other",
        };
        f.write_str(s)
    }
}

pub fn classify(e: &DownloadError) -> FailureKind {
    match e {
        DownloadError::Network(_) => FailureKind::Route,
        DownloadError::Transport(ce) => classify_curl_error(ce),
        DownloadError::HttpStatus(_) => FailureKind::Status,
        DownloadError::ChecksumMismatch { .. } => FailureKind::Checksum,
        DownloadError::Io(io) => match io.kind() {
            std::io::ErrorKind::TimedOut => FailureKind::Timeout,
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => FailureKind::Connection,
            _ => io
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<curl::Error>())
                .map(classify_curl_error)
                .unwrap_or(FailureKind::Other),
        },
        DownloadError::Cancelled => FailureKind::Cancelled,
    }
}

fn classify_curl_error(e: &curl::Error) -> FailureKind {
    if e.is_operation_timedout() {
        return FailureKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_interface_failed()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return FailureKind::Connection;
    }
    FailureKind::Other
}
