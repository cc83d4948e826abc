//! HTTP resource access used by the download workers.
//!
//! `open` returns once the response head is known, so a caller can check the
//! status and release whatever it holds before streaming the body through
//! [`std::io::Read`].

mod classify;
mod easy;

pub use self::classify::{classify, FailureKind};
pub use self::easy::CurlTransport;

use std::io::Read;
use std::time::Duration;

use crate::error::DownloadError;

/// Per-request settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub connect_timeout: Duration,
    /// Abort when no byte arrives for this long.
    pub read_timeout: Duration,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(40),
            user_agent: "Mozilla".to_string(),
            headers: vec![("Connection".to_string(), "Keep-Alive".to_string())],
        }
    }
}

/// Response headers in arrival order; lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Parse a raw `Name: value` line. Status lines and blank lines are ignored.
    pub fn push_line(&mut self, line: &str) {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() && !name.contains(' ') {
                self.push(name, value.trim());
            }
        }
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// An open response: head available, body readable.
pub trait ResourceResponse: Read + Send {
    fn status(&self) -> u32;
    fn header(&self, name: &str) -> Option<&str>;

    fn content_length(&self) -> Option<u64> {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }
}

pub trait ResourceTransport: Send + Sync {
    fn open(&self, url: &str, options: &RequestOptions)
        -> Result<Box<dyn ResourceResponse>, DownloadError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_harness_request() {
        let o = RequestOptions::default();
        assert_eq!(o.connect_timeout, Duration::from_secs(10));
        assert_eq!(o.read_timeout, Duration::from_secs(40));
        assert_eq!(o.user_agent, "Mozilla");
        assert_eq!(
            o.headers,
            vec![("Connection".to_string(), "Keep-Alive".to_string())]
        );
    }

    #[test]
    fn header_lines_parse_and_lookup_ignores_case() {
        let mut h = Headers::new();
        h.push_line("HTTP/1.1 200 OK\r\n");
        h.push_line("Content-Length: 1024\r\n");
        h.push_line("content-disposition: attachment; filename=\"a:b.bin\"\r\n");
        h.push_line("\r\n");
        assert_eq!(h.get("content-length"), Some("1024"));
        assert_eq!(
            h.get("Content-Disposition"),
            Some("attachment; filename=\"a:b.bin\"")
        );
        assert_eq!(h.get("Content-Type"), None);
    }
}
