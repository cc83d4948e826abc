//! `ifdl interfaces` – what the host has and what a run would drive.

use anyhow::Result;
use ifdl_core::config::HarnessConfig;
use ifdl_core::control::CancelToken;
use ifdl_core::platform::{InterfaceInfo, NetworkPlatform};
use ifdl_core::registry::InterfaceRegistry;

use super::host_context;

pub fn run_interfaces(cfg: &HarnessConfig) -> Result<()> {
    let (_route, ctx) = host_context(cfg, CancelToken::new());
    let listing = ctx.platform.interfaces()?;

    println!("{:<16} {:<6} {:<8} {}", "NAME", "INDEX", "FLAGS", "ADDRESSES");
    for info in &listing {
        println!(
            "{:<16} {:<6} {:<8} {}",
            info.name,
            info.index,
            flags(info),
            addresses(info)
        );
    }

    let managers = InterfaceRegistry::for_host(cfg, ctx).load_interfaces();
    println!();
    if managers.is_empty() {
        println!("No interface would be driven by `ifdl run`.");
    } else {
        println!("{:<16} {}", "MANAGED", "KIND");
        for m in managers {
            println!("{:<16} {}", m.name(), m.kind());
        }
    }
    Ok(())
}

fn flags(info: &InterfaceInfo) -> String {
    let mut s = String::new();
    if info.is_up {
        s.push_str("UP");
    }
    if info.is_running {
        s.push_str(if s.is_empty() { "RUN" } else { ",RUN" });
    }
    if info.is_loopback {
        s.push_str(if s.is_empty() { "LO" } else { ",LO" });
    }
    if s.is_empty() {
        s.push('-');
    }
    s
}

fn addresses(info: &InterfaceInfo) -> String {
    if info.addresses.is_empty() {
        return "-".to_string();
    }
    info.addresses
        .iter()
        .map(|a| a.ip.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
