//! Host (Linux) implementation of [`NetworkPlatform`].
//!
//! Interfaces come from `getifaddrs(3)`, gateways from `/proc/net/route` and
//! DNS servers from `/etc/resolv.conf`. `configure` asks the first DHCP
//! client found on `PATH` for a lease. The default route is process state
//! ([`DefaultRoute`]) that the curl transport and the time client bind each
//! new socket to.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::PathBuf;

use super::tools;
use super::{
    find_interface_info, DefaultRoute, InterfaceAddress, InterfaceHandle, InterfaceInfo,
    IpConfiguration, IpSettings, NetworkPlatform,
};
use crate::error::NetworkError;

const PROC_NET_ROUTE: &str = "/proc/net/route";
const RESOLV_CONF: &str = "/etc/resolv.conf";

/// DHCP clients, in the order they are tried.
const DHCP_CLIENTS: &[&str] = &["networkctl", "nmcli", "dhclient"];

/// Network platform backed by the running host.
#[derive(Debug, Clone)]
pub struct HostPlatform {
    route: DefaultRoute,
    proc_route: PathBuf,
    resolv_conf: PathBuf,
}

impl HostPlatform {
    pub fn new(route: DefaultRoute) -> Self {
        Self {
            route,
            proc_route: PathBuf::from(PROC_NET_ROUTE),
            resolv_conf: PathBuf::from(RESOLV_CONF),
        }
    }

    fn lookup(&self, iface: &InterfaceHandle) -> Result<InterfaceInfo, NetworkError> {
        find_interface_info(self, iface.name())?
            .ok_or_else(|| NetworkError::platform(iface.name(), "interface disappeared"))
    }
}

impl NetworkPlatform for HostPlatform {
    fn interfaces(&self) -> Result<Vec<InterfaceInfo>, NetworkError> {
        list_interfaces()
    }

    fn is_started(&self, iface: &InterfaceHandle) -> bool {
        // A listed interface has a loaded driver.
        self.lookup(iface).is_ok()
    }

    fn start(&self, iface: &InterfaceHandle) -> Result<(), NetworkError> {
        self.lookup(iface).map(|_| ())
    }

    fn is_enabled(&self, iface: &InterfaceHandle) -> bool {
        self.lookup(iface).map(|i| i.is_up).unwrap_or(false)
    }

    fn enable(&self, iface: &InterfaceHandle) -> Result<(), NetworkError> {
        tools::run_tool("ip", &["link", "set", iface.name(), "up"])
            .map(|_| ())
            .map_err(|e| NetworkError::platform(iface.name(), e))
    }

    fn configure(&self, iface: &InterfaceHandle, settings: &IpSettings) -> Result<(), NetworkError> {
        if !settings.dhcp {
            tracing::debug!(interface = iface.name(), "static addressing left to the system");
            return Ok(());
        }
        let commands = dhcp_commands(iface.name(), tools::tool_available);
        if commands.is_empty() {
            tracing::warn!(
                interface = iface.name(),
                "no DHCP client found (tried {}), waiting for an address anyway",
                DHCP_CLIENTS.join(", ")
            );
            return Ok(());
        }
        let mut last_err = String::new();
        for (program, args) in commands {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            match tools::run_tool(program, &refs) {
                Ok(_) => {
                    tracing::debug!(interface = iface.name(), client = program, "DHCP lease requested");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(interface = iface.name(), client = program, "DHCP request failed: {}", e);
                    last_err = e;
                }
            }
        }
        Err(NetworkError::platform(iface.name(), last_err))
    }

    fn ip_configuration(&self, iface: &InterfaceHandle) -> Result<IpConfiguration, NetworkError> {
        let info = self.lookup(iface)?;
        let addr = info.usable_address().cloned();
        let gateway = fs::read_to_string(&self.proc_route)
            .ok()
            .and_then(|s| parse_default_gateway(&s, iface.name()))
            .map(IpAddr::V4);
        let dns = fs::read_to_string(&self.resolv_conf)
            .map(|s| parse_nameservers(&s))
            .unwrap_or_default();
        Ok(IpConfiguration {
            ip: addr.as_ref().map(|a| a.ip),
            netmask: addr.and_then(|a| a.netmask),
            gateway,
            dns,
            is_static: false,
        })
    }

    fn set_default(&self, iface: &InterfaceHandle) -> Result<(), NetworkError> {
        self.route.set(iface.name());
        Ok(())
    }
}

/// DHCP requests for `iface`, one per installed client, in preference order.
pub(crate) fn dhcp_commands(
    iface: &str,
    available: impl Fn(&str) -> bool,
) -> Vec<(&'static str, Vec<String>)> {
    DHCP_CLIENTS
        .iter()
        .copied()
        .filter(|program| available(program))
        .map(|program| {
            let args = match program {
                "networkctl" => vec!["reconfigure".to_string(), iface.to_string()],
                "nmcli" => vec!["device".to_string(), "connect".to_string(), iface.to_string()],
                _ => vec!["-nw".to_string(), iface.to_string()],
            };
            (program, args)
        })
        .collect()
}

/// Restrict `socket` to traffic through interface `name` (`SO_BINDTODEVICE`).
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn bind_to_device(socket: &UdpSocket, name: &str) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let name = std::ffi::CString::new(name)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let value = name.as_bytes_with_nul();
    // SAFETY: the fd belongs to a live socket and `value` outlives the call.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_BINDTODEVICE,
            value.as_ptr() as *const libc::c_void,
            value.len() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn bind_to_device(_socket: &UdpSocket, name: &str) -> io::Result<()> {
    tracing::debug!(interface = name, "per-socket interface binding unavailable, using routing table");
    Ok(())
}

/// Default gateway of `iface` from `/proc/net/route` contents (little-endian hex columns).
pub(crate) fn parse_default_gateway(contents: &str, iface: &str) -> Option<Ipv4Addr> {
    contents.lines().skip(1).find_map(|line| {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 3 || cols[0] != iface || cols[1] != "00000000" {
            return None;
        }
        let raw = u32::from_str_radix(cols[2], 16).ok()?;
        if raw == 0 {
            return None;
        }
        Some(Ipv4Addr::from(raw.to_le_bytes()))
    })
}

/// `nameserver` entries of a resolv.conf.
pub(crate) fn parse_nameservers(contents: &str) -> Vec<IpAddr> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#') && !l.starts_with(';'))
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("nameserver"), Some(addr)) => addr.parse().ok(),
                _ => None,
            }
        })
        .collect()
}

#[cfg(unix)]
fn list_interfaces() -> Result<Vec<InterfaceInfo>, NetworkError> {
    use std::ffi::CStr;

    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: getifaddrs writes a heap list into `head`, released below with freeifaddrs.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(NetworkError::platform(
            "*",
            format!("getifaddrs: {}", std::io::Error::last_os_error()),
        ));
    }

    let mut by_name: BTreeMap<String, InterfaceInfo> = BTreeMap::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: cursor walks the list returned by getifaddrs and is non-null here.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;
        if entry.ifa_name.is_null() {
            continue;
        }
        // SAFETY: ifa_name is a NUL-terminated string owned by the list.
        let name = unsafe { CStr::from_ptr(entry.ifa_name) }
            .to_string_lossy()
            .into_owned();
        let flags = entry.ifa_flags as libc::c_int;
        let info = by_name.entry(name.clone()).or_insert_with(|| InterfaceInfo {
            index: interface_index(entry.ifa_name),
            name,
            is_up: flags & libc::IFF_UP != 0,
            is_running: flags & libc::IFF_RUNNING != 0,
            is_loopback: flags & libc::IFF_LOOPBACK != 0,
            addresses: Vec::new(),
        });
        // SAFETY: sockaddr pointers come from the same list and are checked for null inside.
        if let Some(ip) = unsafe { sockaddr_ip(entry.ifa_addr) } {
            let netmask = unsafe { sockaddr_ip(entry.ifa_netmask) };
            info.addresses.push(InterfaceAddress { ip, netmask });
        }
    }
    // SAFETY: head came from a successful getifaddrs call.
    unsafe { libc::freeifaddrs(head) };

    Ok(by_name.into_values().collect())
}

#[cfg(unix)]
fn interface_index(name: *const libc::c_char) -> u32 {
    // SAFETY: name is a valid NUL-terminated interface name.
    unsafe { libc::if_nametoindex(name) }
}

#[cfg(unix)]
unsafe fn sockaddr_ip(sa: *const libc::sockaddr) -> Option<IpAddr> {
    if sa.is_null() {
        return None;
    }
    match (*sa).sa_family as libc::c_int {
        libc::AF_INET => {
            let v4 = &*(sa as *const libc::sockaddr_in);
            Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(v4.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            let v6 = &*(sa as *const libc::sockaddr_in6);
            Some(IpAddr::V6(std::net::Ipv6Addr::from(v6.sin6_addr.s6_addr)))
        }
        _ => None,
    }
}

#[cfg(not(unix))]
fn list_interfaces() -> Result<Vec<InterfaceInfo>, NetworkError> {
    Err(NetworkError::platform(
        "*",
        "interface enumeration is only implemented for unix hosts",
    ))
}
