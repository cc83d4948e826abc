//! Builds the list of interface managers a run drives.
//!
//! Pre-configured interfaces named in `network.interfaces` come first, in
//! list order. Then each managed kind (mobile, Ethernet, Wi-Fi) is asked for
//! a manager through its registered provider; a kind without a provider, or
//! whose provider yields `None`, is left out.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::HarnessConfig;
use crate::manager::{
    EthernetManager, InterfaceKind, LinkContext, MobileManager, NetworkJoinable,
    PreconfiguredManager, WifiManager,
};
use crate::platform::tools::{tool_available, MmcliModem, WpaCliRadio};
use crate::platform::InterfaceInfo;

/// Longest interface name the kernel accepts (IFNAMSIZ - 1).
const MAX_IFNAME_LEN: usize = 15;

/// Managed kinds in load order.
const PROVIDER_ORDER: [InterfaceKind; 3] = [
    InterfaceKind::Mobile,
    InterfaceKind::Ethernet,
    InterfaceKind::Wifi,
];

/// Yields a manager for one kind, or `None` when the environment has no
/// implementation or configuration for it.
pub trait ManagerProvider: Send + Sync {
    fn provide(&self, ctx: &LinkContext) -> Option<Arc<dyn NetworkJoinable>>;
}

impl<F> ManagerProvider for F
where
    F: Fn(&LinkContext) -> Option<Arc<dyn NetworkJoinable>> + Send + Sync,
{
    fn provide(&self, ctx: &LinkContext) -> Option<Arc<dyn NetworkJoinable>> {
        self(ctx)
    }
}

pub struct InterfaceRegistry {
    ctx: LinkContext,
    static_names: Vec<String>,
    providers: HashMap<InterfaceKind, Box<dyn ManagerProvider>>,
}

impl InterfaceRegistry {
    /// `interfaces` is the comma-separated pre-configured list.
    pub fn new(ctx: LinkContext, interfaces: &str) -> Self {
        Self {
            ctx,
            static_names: parse_interface_list(interfaces),
            providers: HashMap::new(),
        }
    }

    /// Registry with the providers this host can back: a kind is registered
    /// when its config section is present and its tool is installed.
    pub fn for_host(config: &HarnessConfig, ctx: LinkContext) -> Self {
        let mut registry = Self::new(ctx, &config.network.interfaces);

        if let Some(eth) = config.ethernet.clone() {
            registry.register(InterfaceKind::Ethernet, move |ctx: &LinkContext| {
                Some(Arc::new(EthernetManager::new(eth.interface_name.clone(), ctx.clone()))
                    as Arc<dyn NetworkJoinable>)
            });
        }

        if let Some(wifi) = config.wifi.clone() {
            if tool_available("wpa_cli") {
                registry.register(InterfaceKind::Wifi, move |ctx: &LinkContext| {
                    let radio = Arc::new(WpaCliRadio::new(wifi.interface_name.clone()));
                    Some(Arc::new(WifiManager::new(
                        wifi.interface_name.clone(),
                        radio,
                        wifi.credentials(),
                        ctx.clone(),
                    )) as Arc<dyn NetworkJoinable>)
                });
            } else {
                tracing::warn!("[wifi] configured but wpa_cli is not installed: Wi-Fi skipped");
            }
        }

        if let Some(mobile) = config.mobile.clone() {
            if tool_available("mmcli") {
                registry.register(InterfaceKind::Mobile, move |ctx: &LinkContext| {
                    Some(Arc::new(MobileManager::new(
                        mobile.interface_name.clone(),
                        Arc::new(MmcliModem::new()),
                        mobile.credentials(),
                        ctx.clone(),
                    )) as Arc<dyn NetworkJoinable>)
                });
            } else {
                tracing::warn!("[mobile] configured but mmcli is not installed: mobile skipped");
            }
        }

        registry
    }

    /// Replace the provider for `kind`. Pre-configured interfaces come from
    /// the name list, not from a provider.
    pub fn register(&mut self, kind: InterfaceKind, provider: impl ManagerProvider + 'static) {
        if kind == InterfaceKind::Preconfigured {
            tracing::warn!("provider for pre-configured interfaces ignored");
            return;
        }
        self.providers.insert(kind, Box::new(provider));
    }

    pub fn static_names(&self) -> &[String] {
        &self.static_names
    }

    pub fn load_interfaces(&self) -> Vec<Arc<dyn NetworkJoinable>> {
        let mut out = self.load_preconfigured();
        for kind in PROVIDER_ORDER {
            let Some(provider) = self.providers.get(&kind) else {
                continue;
            };
            match provider.provide(&self.ctx) {
                Some(manager) => {
                    tracing::info!("{} network interface \"{}\" registered", kind, manager.name());
                    out.push(manager);
                }
                None => tracing::debug!("no {} network interface provided", kind),
            }
        }
        out
    }

    fn load_preconfigured(&self) -> Vec<Arc<dyn NetworkJoinable>> {
        if self.static_names.is_empty() {
            return Vec::new();
        }
        let listing: Vec<InterfaceInfo> = match self.ctx.platform.interfaces() {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list network interfaces");
                Vec::new()
            }
        };

        let mut out: Vec<Arc<dyn NetworkJoinable>> = Vec::new();
        for name in &self.static_names {
            let found = is_valid_interface_name(name)
                .then(|| listing.iter().find(|i| &i.name == name))
                .flatten();
            match found {
                Some(info) => {
                    tracing::info!("Network interface \"{}\" registered", name);
                    out.push(Arc::new(PreconfiguredManager::new(
                        info.handle(),
                        self.ctx.platform.clone(),
                    )));
                }
                None => tracing::warn!("Network interface \"{}\" not available: ignored.", name),
            }
        }
        out
    }
}

/// Split the comma-separated list, trimming entries and dropping empty ones.
pub fn parse_interface_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn is_valid_interface_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IFNAME_LEN
        && !name.contains('/')
        && !name.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::testing::rig;

    fn kinds_and_names(list: &[Arc<dyn NetworkJoinable>]) -> Vec<(InterfaceKind, String)> {
        list.iter().map(|m| (m.kind(), m.name().to_string())).collect()
    }

    #[test]
    fn list_parsing_drops_empty_entries() {
        assert_eq!(parse_interface_list(" eth0, ,wlan0,,"), vec!["eth0", "wlan0"]);
        assert!(parse_interface_list("").is_empty());
    }

    #[test]
    fn interface_name_rules() {
        assert!(is_valid_interface_name("enp0s31f6"));
        assert!(!is_valid_interface_name("eth 0"));
        assert!(!is_valid_interface_name("a/b"));
        assert!(!is_valid_interface_name("averyveryverylongname"));
    }

    #[test]
    fn absent_and_malformed_names_are_skipped() {
        let r = rig(None);
        r.platform.add_ready("eth0", "10.0.0.2");
        r.platform.add_ready("usb0", "10.0.1.2");
        let registry = InterfaceRegistry::new(r.ctx.clone(), "usb0,ghost0,bad/name,eth0");

        let loaded = registry.load_interfaces();

        assert_eq!(
            kinds_and_names(&loaded),
            vec![
                (InterfaceKind::Preconfigured, "usb0".to_string()),
                (InterfaceKind::Preconfigured, "eth0".to_string()),
            ]
        );
    }

    #[test]
    fn providers_follow_fixed_order_after_static_interfaces() {
        let r = rig(None);
        r.platform.add_ready("eth0", "10.0.0.2");
        let mut registry = InterfaceRegistry::new(r.ctx.clone(), "eth0");
        registry.register(InterfaceKind::Wifi, |ctx: &LinkContext| {
            Some(Arc::new(EthernetManager::new("wlan-as-eth", ctx.clone())) as Arc<dyn NetworkJoinable>)
        });
        registry.register(InterfaceKind::Ethernet, |ctx: &LinkContext| {
            Some(Arc::new(EthernetManager::new("eth1", ctx.clone())) as Arc<dyn NetworkJoinable>)
        });
        registry.register(
            InterfaceKind::Mobile,
            |_: &LinkContext| -> Option<Arc<dyn NetworkJoinable>> { None },
        );

        let names: Vec<String> = registry
            .load_interfaces()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, vec!["eth0", "eth1", "wlan-as-eth"]);
    }

    #[test]
    fn host_registry_without_sections_loads_only_static_interfaces() {
        let r = rig(None);
        r.platform.add_ready("eth0", "10.0.0.2");
        let mut cfg = HarnessConfig::default();
        cfg.network.interfaces = "eth0".into();
        let registry = InterfaceRegistry::for_host(&cfg, r.ctx.clone());
        assert_eq!(registry.static_names(), &["eth0".to_string()]);
        assert_eq!(registry.load_interfaces().len(), 1);
    }

    #[test]
    fn host_registry_registers_configured_ethernet() {
        let r = rig(None);
        let mut cfg = HarnessConfig::default();
        cfg.ethernet = Some(crate::config::EthernetConfig {
            interface_name: "eth1".into(),
        });
        let loaded = InterfaceRegistry::for_host(&cfg, r.ctx.clone()).load_interfaces();
        assert_eq!(
            kinds_and_names(&loaded),
            vec![(InterfaceKind::Ethernet, "eth1".to_string())]
        );
    }
}
