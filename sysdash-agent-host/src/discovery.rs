//! Host identification for sysdash nodes
//!
//! This module handles:
//! - Machine hostname used as the default display name
//! - Interface enumeration with IP addresses
//! - Choosing the address an agent advertises to its master

use if_addrs::get_if_addrs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::warn;

/// Interface type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Ethernet,
    Wireless,
    Loopback,
    Other,
}

/// Machine hostname, as reported by the OS
pub fn hostname() -> String {
    gethostname::gethostname().to_string_lossy().to_string()
}

/// IP addresses grouped by interface name
pub fn interface_addresses() -> HashMap<String, Vec<String>> {
    let mut addresses: HashMap<String, Vec<String>> = HashMap::new();
    match get_if_addrs() {
        Ok(if_addrs) => {
            for if_addr in if_addrs {
                addresses.entry(if_addr.name.clone()).or_default().push(if_addr.ip().to_string());
            }
        }
        Err(e) => warn!("Failed to enumerate network interfaces: {}", e),
    }
    addresses
}

/// Classify interface type based on name patterns
pub fn classify_interface(name: &str) -> InterfaceType {
    let name_lower = name.to_lowercase();

    if name_lower == "lo" || name_lower.starts_with("lo0") || name_lower.starts_with("loopback") {
        return InterfaceType::Loopback;
    }

    if name_lower.starts_with("wlan") || name_lower.starts_with("wlp") ||
       name_lower.starts_with("wlo") || name_lower.contains("wifi") {
        return InterfaceType::Wireless;
    }

    if name_lower.starts_with("eth") || name_lower.starts_with("en") {
        return InterfaceType::Ethernet;
    }

    InterfaceType::Other
}

/// Host an agent should announce to its master.
///
/// An explicit override wins, then a concrete bind address. A wildcard bind
/// (`0.0.0.0`, `::`) yields `None` so the master falls back to the address it
/// sees the call coming from.
pub fn advertised_host(explicit: Option<&str>, bind_host: &str) -> Option<String> {
    if let Some(host) = explicit.map(str::trim).filter(|h| !h.is_empty()) {
        return Some(host.to_string());
    }

    match bind_host.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() => None,
        Ok(ip) => Some(ip.to_string()),
        // a hostname bind is reachable under that name
        Err(_) if !bind_host.trim().is_empty() => Some(bind_host.trim().to_string()),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_classification() {
        assert_eq!(classify_interface("eth0"), InterfaceType::Ethernet);
        assert_eq!(classify_interface("enp3s0"), InterfaceType::Ethernet);
        assert_eq!(classify_interface("wlan0"), InterfaceType::Wireless);
        assert_eq!(classify_interface("lo"), InterfaceType::Loopback);
        assert_eq!(classify_interface("docker0"), InterfaceType::Other);
    }

    #[test]
    fn test_advertised_host_prefers_override() {
        assert_eq!(advertised_host(Some("dash.example.org"), "0.0.0.0").as_deref(), Some("dash.example.org"));
        assert_eq!(advertised_host(Some("  "), "10.0.0.7").as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn test_wildcard_bind_is_left_to_master() {
        assert_eq!(advertised_host(None, "0.0.0.0"), None);
        assert_eq!(advertised_host(None, "::"), None);
        assert_eq!(advertised_host(None, "127.0.0.1").as_deref(), Some("127.0.0.1"));
        assert_eq!(advertised_host(None, "localhost").as_deref(), Some("localhost"));
    }

    #[test]
    fn test_hostname_is_not_empty() {
        assert!(!hostname().is_empty());
    }
}
