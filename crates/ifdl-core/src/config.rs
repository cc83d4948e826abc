use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checksum;
use crate::error::ConfigError;
use crate::manager::{MobileCredentials, WifiCredentials};
use crate::platform::SecurityMode;
use crate::poll::PollPolicy;
use crate::retry::RetryPolicy;

/// What to download and how hard to hammer it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub url: String,
    /// Expected CRC-32 of the resource, 8 hex digits.
    pub crc32: String,
    pub workers_per_interface: usize,
    pub iterations: u32,
    /// Iteration start/end lines go to INFO every N iterations, DEBUG otherwise.
    pub log_info_every: u32,
    /// Progress log step; rounded to the nearest 10 and clamped to 10..=100.
    pub progress_step_percent: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            url: "http://example.com/resource.bin".to_string(),
            crc32: "00000000".to_string(),
            workers_per_interface: 1,
            iterations: 1,
            log_info_every: 1,
            progress_step_percent: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Pre-configured interfaces, comma-separated.
    pub interfaces: String,
    pub poll_interval_ms: u64,
    /// Ceiling on discovery and address polling. `None` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wait_secs: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interfaces: String::new(),
            poll_interval_ms: 1000,
            max_wait_secs: None,
        }
    }
}

impl NetworkConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthernetConfig {
    pub interface_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiConfig {
    pub interface_name: String,
    pub ssid: String,
    #[serde(default)]
    pub passphrase: String,
    #[serde(default = "default_security")]
    pub security: SecurityMode,
}

fn default_security() -> SecurityMode {
    SecurityMode::Wpa2
}

impl WifiConfig {
    pub fn credentials(&self) -> WifiCredentials {
        WifiCredentials {
            ssid: self.ssid.clone(),
            passphrase: self.passphrase.clone(),
            security: self.security,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobileConfig {
    pub interface_name: String,
    pub apn: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub passphrase: String,
    #[serde(default)]
    pub pin_code: String,
}

impl MobileConfig {
    pub fn credentials(&self) -> MobileCredentials {
        MobileCredentials {
            apn: self.apn.clone(),
            user: self.user.clone(),
            passphrase: self.passphrase.clone(),
            pin_code: self.pin_code.clone(),
        }
    }
}

/// SNTP server used to check the local clock after each join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSyncConfig {
    pub server: String,
    pub attempts: u32,
    pub timeout_secs: u64,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            server: "pool.ntp.org:123".to_string(),
            attempts: 3,
            timeout_secs: 5,
        }
    }
}

impl TimeSyncConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.attempts.max(1),
            ..RetryPolicy::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Harness configuration loaded from `~/.config/ifdl/config.toml`.
///
/// The `[ethernet]`, `[wifi]` and `[mobile]` sections are optional; a
/// missing section means that kind of manager is not loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethernet: Option<EthernetConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<WifiConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<MobileConfig>,
    #[serde(default)]
    pub time_sync: TimeSyncConfig,
}

impl HarnessConfig {
    /// Apply `IFDL_*` overrides. `lookup` is `std::env::var(..).ok()` outside tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IFDL_NETWORK_INTERFACES") {
            self.network.interfaces = v;
        }
        if let Some(v) = lookup("IFDL_DOWNLOAD_URL") {
            self.download.url = v;
        }
        if let Some(v) = lookup("IFDL_DOWNLOAD_CRC32") {
            self.download.crc32 = v;
        }
        if let Some(v) = lookup("IFDL_WORKERS_PER_INTERFACE") {
            self.download.workers_per_interface = parse_override("IFDL_WORKERS_PER_INTERFACE", &v)?;
        }
        if let Some(v) = lookup("IFDL_ITERATIONS") {
            self.download.iterations = parse_override("IFDL_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("IFDL_LOG_INFO_EVERY") {
            self.download.log_info_every = parse_override("IFDL_LOG_INFO_EVERY", &v)?;
        }
        if let Some(v) = lookup("IFDL_WIFI_SECURITY") {
            let index: u32 = parse_override("IFDL_WIFI_SECURITY", &v)?;
            let mode = SecurityMode::from_index(index).ok_or(ConfigError::InvalidOverride {
                var: "IFDL_WIFI_SECURITY",
                value: v.clone(),
            })?;
            match self.wifi.as_mut() {
                Some(wifi) => wifi.security = mode,
                None => tracing::warn!("IFDL_WIFI_SECURITY set but no [wifi] section: ignored"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.download.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{} ({})", self.download.url, e)))?;
        if !checksum::is_valid_expected(&self.download.crc32) {
            return Err(ConfigError::InvalidChecksum(self.download.crc32.clone()));
        }
        if self.download.workers_per_interface == 0 {
            return Err(ConfigError::ZeroCount {
                field: "download.workers_per_interface",
            });
        }
        if self.download.iterations == 0 {
            return Err(ConfigError::ZeroCount {
                field: "download.iterations",
            });
        }
        if self.download.log_info_every == 0 {
            return Err(ConfigError::ZeroCount {
                field: "download.log_info_every",
            });
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        var,
        value: value.to_string(),
    })
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ifdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HarnessConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HarnessConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<HarnessConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
