//! Outgoing interface selection

use anyhow::{anyhow, Result};
use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use std::net::Ipv4Addr;

/// Resolve an interface name (e.g. `eth0`) or literal IPv4 address
pub fn resolve_ipv4(name: &str) -> Result<Ipv4Addr> {
    if let Ok(ip) = name.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    let interfaces = NetworkInterface::show()?;
    interfaces
        .iter()
        .filter(|iface| iface.name == name)
        .flat_map(|iface| iface.addr.iter())
        .find_map(|addr| match addr {
            network_interface::Addr::V4(v4) => Some(v4.ip),
            network_interface::Addr::V6(_) => None,
        })
        .ok_or_else(|| anyhow!("No IPv4 address found for interface {}", name))
}

/// Names and IPv4 addresses of the interfaces able to send multicast
pub fn list_ipv4() -> Result<Vec<(String, Ipv4Addr)>> {
    let mut interfaces: Vec<(String, Ipv4Addr)> = NetworkInterface::show()?
        .into_iter()
        .filter_map(|iface| {
            iface.addr.iter().find_map(|addr| {
                if let network_interface::Addr::V4(v4) = addr {
                    Some((iface.name.clone(), v4.ip))
                } else {
                    None
                }
            })
        })
        .filter(|(_, ip)| !ip.is_loopback())
        .collect();
    interfaces.sort();
    Ok(interfaces)
}
