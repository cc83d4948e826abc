//! Config assembly for the CLI: file, then `IFDL_*` environment, then flags.

use anyhow::{Context, Result};
use ifdl_core::config::{self, HarnessConfig};
use std::path::Path;

/// Values given on the `run` command line.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub url: Option<String>,
    pub crc32: Option<String>,
    pub workers: Option<usize>,
    pub iterations: Option<u32>,
    pub interfaces: Option<String>,
}

impl RunOverrides {
    pub fn apply(&self, cfg: &mut HarnessConfig) {
        if let Some(url) = &self.url {
            cfg.download.url = url.clone();
        }
        if let Some(crc) = &self.crc32 {
            cfg.download.crc32 = crc.clone();
        }
        if let Some(n) = self.workers {
            cfg.download.workers_per_interface = n;
        }
        if let Some(n) = self.iterations {
            cfg.download.iterations = n;
        }
        if let Some(list) = &self.interfaces {
            cfg.network.interfaces = list.clone();
        }
    }
}

pub fn load_config(path: Option<&Path>, overrides: &RunOverrides) -> Result<HarnessConfig> {
    let mut cfg = match path {
        Some(p) => config::load_from_path(p)?,
        None => config::load_or_init()?,
    };
    cfg.apply_env_overrides(|var| std::env::var(var).ok())
        .context("environment override")?;
    overrides.apply(&mut cfg);
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}
