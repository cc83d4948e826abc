//! Streaming CRC-32 verification of downloaded payloads.
//!
//! The checksum is fed chunk by chunk while the body streams in, so the
//! result never depends on how the transport split the bytes.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Width of the rendered checksum in hex digits.
pub const CHECKSUM_HEX_WIDTH: usize = 8;

/// A rolling 32-bit checksum.
pub trait Checksum32 {
    fn update(&mut self, bytes: &[u8]);
    fn value(&self) -> u32;

    /// Lowercase hex, left-padded with zeros to [`CHECKSUM_HEX_WIDTH`].
    fn padded_hex(&self) -> String {
        format!("{:08x}", self.value())
    }
}

/// CRC-32 (IEEE) backed by `crc32fast`.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32").field("value", &self.padded_hex()).finish()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Checksum32 for Crc32 {
    fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    fn value(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

/// True if `expected` names the same checksum as `computed_hex`, ignoring case.
pub fn matches_expected(expected: &str, computed_hex: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(computed_hex)
}

/// True if `s` is exactly eight hex digits.
pub fn is_valid_expected(s: &str) -> bool {
    s.len() == CHECKSUM_HEX_WIDTH && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Compute the padded CRC-32 of a file, reading in bounded chunks.
pub fn crc32_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut crc = Crc32::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        crc.update(&buf[..n]);
    }
    Ok(crc.padded_hex())
}
