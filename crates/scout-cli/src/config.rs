//! Configuration loading and validation

use anyhow::{bail, Result};
use scout_core::DEFAULT_TYPE_FILTERS;
use scout_discovery::MAX_WINDOW;
use scout_transport::{UdpTransportConfig, WS_DISCOVERY_GROUP, WS_DISCOVERY_PORT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Collection window in milliseconds
    #[serde(default = "default_time_ms")]
    pub time_ms: u64,
    /// Types to probe for, one probe each
    #[serde(default = "default_types")]
    pub types: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            time_ms: default_time_ms(),
            types: default_types(),
        }
    }
}

fn default_time_ms() -> u64 {
    5000
}

fn default_types() -> Vec<String> {
    DEFAULT_TYPE_FILTERS.iter().map(|t| t.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Probe destination, the WS-Discovery group unless probing one host
    #[serde(default = "default_target")]
    pub target: SocketAddr,
    /// Interface name or IPv4 address for outgoing multicast
    #[serde(default)]
    pub interface: Option<String>,
    /// Multicast TTL
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            interface: None,
            ttl: default_ttl(),
        }
    }
}

fn default_target() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(WS_DISCOVERY_GROUP), WS_DISCOVERY_PORT)
}

fn default_ttl() -> u32 {
    1
}

impl Config {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.discovery.time_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery.time_ms == 0 {
            bail!("discovery.time_ms must be greater than zero");
        }
        if u128::from(self.discovery.time_ms) > MAX_WINDOW.as_millis() {
            bail!(
                "discovery.time_ms must not exceed {} ms",
                MAX_WINDOW.as_millis()
            );
        }
        if self.discovery.types.iter().all(|t| t.trim().is_empty()) {
            bail!("discovery.types must name at least one type");
        }
        if self.transport.ttl == 0 {
            bail!("transport.ttl must be greater than zero");
        }
        Ok(())
    }

    /// Convert to the transport's configuration
    pub fn to_transport_config(&self) -> Result<UdpTransportConfig> {
        let interface = match self.transport.interface.as_deref() {
            Some(name) => Some(crate::interface::resolve_ipv4(name)?),
            None => None,
        };

        let mut config = if self.transport.target.ip().is_multicast() {
            UdpTransportConfig {
                target: self.transport.target,
                ..UdpTransportConfig::default()
            }
        } else {
            UdpTransportConfig::unicast(self.transport.target)
        };
        config.interface = interface;
        config.ttl = self.transport.ttl;
        Ok(config)
    }
}

/// Load configuration from file
///
/// The result is not validated yet, command line overrides still apply.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        config
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Config::default()
    };

    Ok(config)
}
