//! Error types shared by interface managers, the transport and the workers.

use thiserror::Error;

/// Failure while bringing up or selecting a network interface.
///
/// Any of these returned from `init()` aborts the whole harness run.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The named interface never showed up in the platform interface list
    /// (only reachable when a polling ceiling is configured).
    #[error("no {kind} interface found: {name}")]
    InterfaceNotFound { kind: String, name: String },
    /// Association / session activation failed or could not be verified.
    #[error("join failed on {name}: {reason}")]
    JoinFailed { name: String, reason: String },
    /// No usable address was assigned before the polling ceiling.
    #[error("no address assigned to {name}")]
    AddressAssignmentTimeout { name: String },
    /// `set_default` called on a manager that holds no interface handle.
    #[error("interface {name} is not initialized")]
    NoInterface { name: String },
    /// The platform layer refused an operation (start, enable, configure, route).
    #[error("platform error on {name}: {message}")]
    Platform { name: String, message: String },
    #[error("cancelled while waiting for {what}")]
    Cancelled { what: String },
}

impl NetworkError {
    pub fn platform(name: &str, message: impl Into<String>) -> Self {
        NetworkError::Platform {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Failure of a single download iteration. Never fatal to the worker.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Selecting the worker's interface as default route failed.
    #[error("default route: {0}")]
    Network(#[from] NetworkError),
    /// libcurl reported an error (connect, timeout, reset, ...).
    #[error("transport: {0}")]
    Transport(#[from] curl::Error),
    /// Response status was not 200.
    #[error("HTTP ERROR:{0}")]
    HttpStatus(u32),
    #[error("CRC32 error, expected [{expected}], computed [{computed}]")]
    ChecksumMismatch { expected: String, computed: String },
    #[error("read body: {0}")]
    Io(#[from] std::io::Error),
    #[error("download cancelled")]
    Cancelled,
}

/// Failure of one local-time update attempt. Logged, never propagated out of `init()`.
#[derive(Debug, Error)]
pub enum TimeSyncError {
    #[error("time server {server}: {source}")]
    Io {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("time server {server} sent an invalid reply: {reason}")]
    InvalidReply { server: String, reason: String },
}

/// Rejected configuration value, reported before anything is brought up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("download.url is not a valid URL: {0}")]
    InvalidUrl(String),
    #[error("download.crc32 must be 8 hex digits, got {0:?}")]
    InvalidChecksum(String),
    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },
    #[error("{var}: cannot parse {value:?}")]
    InvalidOverride { var: &'static str, value: String },
}
