//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Root configuration for the WebSocket proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upgrade and routing settings.
    pub upgrade: UpgradeConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Backend nodes, looked up by `<node_key_prefix><hostname>-<service>`.
    pub nodes: Vec<NodeConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl ListenerConfig {
    /// Parse the bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.bind_address.parse()
    }

    /// Replace the port of the bind address, keeping its host part.
    pub fn set_port(&mut self, port: u16) -> Result<(), std::net::AddrParseError> {
        let mut addr = self.socket_addr()?;
        addr.set_port(port);
        self.bind_address = addr.to_string();
        Ok(())
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// What to do with a downstream connection that has no upstream to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeadEndPolicy {
    /// Keep the downstream open, drop its frames until it leaves.
    #[default]
    Lenient,
    /// Close the downstream immediately with an explanatory close frame.
    Strict,
}

/// Upgrade negotiation and route parsing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// First path segment of an upgrade route (`/wsin/<host>/<service>/...`).
    pub route_prefix: String,

    /// Prefix prepended to `<host>-<service>` to form the registry key.
    pub node_key_prefix: String,

    /// Largest accepted message, in bytes, on either leg.
    pub max_message_size: usize,

    /// Largest accepted frame, in bytes, on either leg.
    pub max_frame_size: usize,

    /// Behaviour when a session cannot be routed or loses its upstream.
    pub dead_end: DeadEndPolicy,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            route_prefix: "wsin".to_string(),
            node_key_prefix: "wsnode-".to_string(),
            max_message_size: 5 * 1024 * 1024, // 5 MiB
            max_frame_size: 5 * 1024 * 1024,
            dead_end: DeadEndPolicy::Lenient,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connect + handshake bound in seconds. Unset means no bound.
    pub connect_secs: Option<u64>,

    /// How long a closing leg may take to finish its close handshake, in milliseconds.
    pub close_grace_ms: u64,

    /// How long shutdown waits for live sessions to close, in seconds.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: None,
            close_grace_ms: 2000,
            drain_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// A backend node reachable through the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Host segment of the route.
    pub hostname: String,

    /// Service segment of the route.
    pub service: String,

    /// Address the proxy connects to (IP literal or DNS name).
    pub ip: String,

    /// Port the proxy connects to.
    pub port: u16,
}
