//! `ifdl checksum` – CRC-32 of a local file.

use anyhow::Result;
use ifdl_core::checksum;
use std::path::Path;

/// Compute and print the padded CRC-32 of the given file.
pub fn run_checksum(path: &Path) -> Result<()> {
    let crc = checksum::crc32_path(path)?;
    println!("{}  {}", crc, path.display());
    Ok(())
}
