//! Wi-Fi and cellular control through the host's command-line tools.
//!
//! `wpa_cli` drives wpa_supplicant for association; `mmcli` drives
//! ModemManager for SIM unlock and data sessions. Both are optional: the
//! registry only offers the matching manager when the tool is on `PATH`.

use std::fmt;
use std::process::Command;
use std::sync::Mutex;

use super::{AccessPoint, Modem, SecurityMode, WifiRadio};
use crate::error::NetworkError;

/// Run `program args...`, returning stdout on success or a readable error.
pub fn run_tool(program: &str, args: &[&str]) -> Result<String, String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| format!("{}: {}", program, e))?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{} {} exited with {}: {}",
            program,
            args.first().copied().unwrap_or(""),
            output.status,
            stderr.trim()
        ));
    }
    Ok(stdout)
}

/// True if `program` resolves to a file somewhere on `PATH`.
pub fn tool_available(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}

type WpaRunner = Box<dyn Fn(&[&str]) -> Result<String, String> + Send + Sync>;

/// wpa_supplicant client for one interface.
pub struct WpaCliRadio {
    interface: String,
    network_id: Mutex<Option<String>>,
    run: WpaRunner,
}

impl fmt::Debug for WpaCliRadio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WpaCliRadio")
            .field("interface", &self.interface)
            .field("network_id", &self.network_id)
            .finish()
    }
}

impl WpaCliRadio {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            network_id: Mutex::new(None),
            run: Box::new(|args: &[&str]| run_tool("wpa_cli", args)),
        }
    }

    #[cfg(test)]
    fn with_runner(
        interface: &str,
        run: impl Fn(&[&str]) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            interface: interface.into(),
            network_id: Mutex::new(None),
            run: Box::new(run),
        }
    }

    fn wpa(&self, args: &[&str]) -> Result<String, NetworkError> {
        let mut full = vec!["-i", self.interface.as_str()];
        full.extend_from_slice(args);
        let out = (self.run)(&full).map_err(|e| NetworkError::JoinFailed {
            name: self.interface.clone(),
            reason: e,
        })?;
        // wpa_cli exits 0 even when the daemon answers FAIL.
        if out.trim() == "FAIL" {
            return Err(NetworkError::JoinFailed {
                name: self.interface.clone(),
                reason: format!("wpa_cli {} answered FAIL", args.first().copied().unwrap_or("")),
            });
        }
        Ok(out)
    }
}

impl WifiRadio for WpaCliRadio {
    fn join(&self, ssid: &str, passphrase: &str, security: SecurityMode) -> Result<(), NetworkError> {
        let id = self.wpa(&["add_network"])?.trim().to_string();
        // Remembered before configuring so `leave` can remove a half-built block.
        *self.network_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(id.clone());
        let quoted_ssid = format!("\"{}\"", ssid);
        self.wpa(&["set_network", &id, "ssid", &quoted_ssid])?;
        for (key, value) in network_settings(security, passphrase) {
            self.wpa(&["set_network", &id, key, &value])?;
        }
        self.wpa(&["select_network", &id])?;
        self.wpa(&["enable_network", &id])?;
        Ok(())
    }

    fn joined(&self) -> Result<Option<AccessPoint>, NetworkError> {
        Ok(parse_wpa_status(&self.wpa(&["status"])?))
    }

    fn leave(&self) -> Result<(), NetworkError> {
        self.wpa(&["disconnect"])?;
        let id = self
            .network_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(id) = id {
            self.wpa(&["remove_network", &id])?;
        }
        Ok(())
    }
}

/// wpa_supplicant network block entries for a security mode.
pub(crate) fn network_settings(security: SecurityMode, passphrase: &str) -> Vec<(&'static str, String)> {
    let psk = format!("\"{}\"", passphrase);
    match security {
        SecurityMode::Open => vec![("key_mgmt", "NONE".to_string())],
        SecurityMode::Wpa1 => vec![
            ("key_mgmt", "WPA-PSK".to_string()),
            ("proto", "WPA".to_string()),
            ("psk", psk),
        ],
        SecurityMode::Wpa2 => vec![
            ("key_mgmt", "WPA-PSK".to_string()),
            ("proto", "RSN".to_string()),
            ("psk", psk),
        ],
        SecurityMode::MixedWpa1Wpa2 => vec![
            ("key_mgmt", "WPA-PSK".to_string()),
            ("proto", "WPA RSN".to_string()),
            ("psk", psk),
        ],
        SecurityMode::Wpa3 => vec![
            ("key_mgmt", "SAE".to_string()),
            ("ieee80211w", "2".to_string()),
            ("sae_password", psk),
        ],
        SecurityMode::MixedWpa2Wpa3 => vec![
            ("key_mgmt", "WPA-PSK SAE".to_string()),
            ("ieee80211w", "1".to_string()),
            ("psk", psk),
        ],
    }
}

/// Joined access point from `wpa_cli status` output.
pub(crate) fn parse_wpa_status(out: &str) -> Option<AccessPoint> {
    let mut completed = false;
    let mut ssid = None;
    let mut bssid = None;
    for line in out.lines() {
        match line.trim().split_once('=') {
            Some(("wpa_state", v)) => completed = v == "COMPLETED",
            Some(("ssid", v)) => ssid = Some(v.to_string()),
            Some(("bssid", v)) => bssid = Some(v.to_string()),
            _ => {}
        }
    }
    if !completed {
        return None;
    }
    ssid.map(|ssid| AccessPoint { ssid, bssid })
}

/// ModemManager client for the first available modem.
#[derive(Debug, Default)]
pub struct MmcliModem;

impl MmcliModem {
    pub fn new() -> Self {
        Self
    }

    fn mmcli(&self, args: &[String]) -> Result<String, NetworkError> {
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tool("mmcli", &refs).map_err(|e| NetworkError::JoinFailed {
            name: "modem".into(),
            reason: e,
        })
    }
}

impl Modem for MmcliModem {
    fn unlock_sim(&self, pin: &str) -> Result<(), NetworkError> {
        if pin.is_empty() {
            return Ok(());
        }
        self.mmcli(&["-i".into(), "any".into(), format!("--pin={}", pin)])
            .map(|_| ())
    }

    fn activate_session(&self, apn: &str, user: &str, passphrase: &str) -> Result<(), NetworkError> {
        self.mmcli(&[
            "-m".into(),
            "any".into(),
            format!("--simple-connect={}", simple_connect_args(apn, user, passphrase)),
        ])
        .map(|_| ())
    }

    fn deactivate_session(&self) -> Result<(), NetworkError> {
        self.mmcli(&["-m".into(), "any".into(), "--simple-disconnect".into()])
            .map(|_| ())
    }
}

/// `--simple-connect` argument; empty credentials are omitted.
pub(crate) fn simple_connect_args(apn: &str, user: &str, passphrase: &str) -> String {
    let mut parts = vec![format!("apn={}", apn)];
    if !user.is_empty() {
        parts.push(format!("user={}", user));
    }
    if !passphrase.is_empty() {
        parts.push(format!("password={}", passphrase));
    }
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wpa_status_completed() {
        let out = "bssid=aa:bb:cc:dd:ee:ff\nfreq=2437\nssid=lab\nid=0\nmode=station\nwpa_state=COMPLETED\nip_address=192.168.1.20\n";
        let ap = parse_wpa_status(out).unwrap();
        assert_eq!(ap.ssid, "lab");
        assert_eq!(ap.bssid.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn wpa_status_not_associated() {
        assert!(parse_wpa_status("wpa_state=SCANNING\nssid=lab\n").is_none());
        assert!(parse_wpa_status("wpa_state=COMPLETED\n").is_none());
        assert!(parse_wpa_status("").is_none());
    }

    #[test]
    fn network_settings_per_mode() {
        let open = network_settings(SecurityMode::Open, "ignored");
        assert_eq!(open, vec![("key_mgmt", "NONE".to_string())]);

        let wpa2 = network_settings(SecurityMode::Wpa2, "secret");
        assert!(wpa2.contains(&("psk", "\"secret\"".to_string())));
        assert!(wpa2.contains(&("proto", "RSN".to_string())));

        let wpa3 = network_settings(SecurityMode::Wpa3, "secret");
        assert!(wpa3.contains(&("key_mgmt", "SAE".to_string())));
    }

    #[test]
    fn simple_connect_omits_empty_credentials() {
        assert_eq!(simple_connect_args("internet", "", ""), "apn=internet");
        assert_eq!(
            simple_connect_args("internet", "bob", "pw"),
            "apn=internet,user=bob,password=pw"
        );
    }

    #[test]
    fn failed_join_still_removes_network_block() {
        let calls = std::sync::Arc::new(Mutex::new(Vec::<String>::new()));
        let seen = calls.clone();
        let radio = WpaCliRadio::with_runner("wlan0", move |args| {
            let line = args.join(" ");
            seen.lock().unwrap().push(line.clone());
            if line.ends_with("add_network") {
                Ok("3\n".into())
            } else if line.contains(" psk ") {
                Ok("FAIL\n".into())
            } else {
                Ok("OK\n".into())
            }
        });

        assert!(radio.join("lab", "secret", SecurityMode::Wpa2).is_err());
        radio.leave().unwrap();

        let calls = calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.contains("select_network")));
        assert_eq!(calls.last().map(String::as_str), Some("-i wlan0 remove_network 3"));
    }

    #[test]
    fn leave_without_join_only_disconnects() {
        let calls = std::sync::Arc::new(Mutex::new(Vec::<String>::new()));
        let seen = calls.clone();
        let radio = WpaCliRadio::with_runner("wlan0", move |args| {
            seen.lock().unwrap().push(args.join(" "));
            Ok("OK\n".into())
        });
        radio.leave().unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["-i wlan0 disconnect".to_string()]);
    }

    #[test]
    fn missing_tool_is_reported() {
        assert!(!tool_available("ifdl-definitely-not-a-real-tool"));
        assert!(run_tool("ifdl-definitely-not-a-real-tool", &[]).is_err());
    }
}
