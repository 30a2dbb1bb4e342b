//! Backend node descriptors.

use std::fmt;

use crate::config::NodeConfig;

/// Registry key for a host/service pair: `<prefix><host>-<service>`.
pub fn node_key(prefix: &str, host: &str, service: &str) -> String {
    format!("{}{}-{}", prefix, host, service)
}

/// Where a routed session's upstream lives.
///
/// Owned by the registry; lookups hand out clones and the proxy never
/// mutates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub key: String,
    pub host: String,
    pub service: String,
    pub ip: String,
    pub port: u16,
}

impl NodeDescriptor {
    /// Build a descriptor from its configuration entry.
    pub fn from_config(key_prefix: &str, config: &NodeConfig) -> Self {
        Self {
            key: node_key(key_prefix, &config.hostname, &config.service),
            host: config.hostname.clone(),
            service: config.service.clone(),
            ip: config.ip.clone(),
            port: config.port,
        }
    }

    /// `ip:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.ip.contains(':') && !self.ip.starts_with('[') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.authority())
    }
}
