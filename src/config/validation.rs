//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes > 0, ports valid)
//! - Check node addresses and key uniqueness
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::registry::node_key;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("upgrade.{0} must be greater than zero")]
    ZeroSize(&'static str),

    #[error("upgrade.route_prefix `{0}` must be a single non-empty path segment")]
    RoutePrefix(String),

    #[error("nodes[{index}]: {reason}")]
    Node { index: usize, reason: String },

    #[error("nodes[{index}]: key `{key}` is already defined")]
    DuplicateNode { index: usize, key: String },
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.socket_addr().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.upgrade.max_message_size == 0 {
        errors.push(ValidationError::ZeroSize("max_message_size"));
    }
    if config.upgrade.max_frame_size == 0 {
        errors.push(ValidationError::ZeroSize("max_frame_size"));
    }

    let prefix = &config.upgrade.route_prefix;
    if prefix.is_empty() || prefix.contains('/') {
        errors.push(ValidationError::RoutePrefix(prefix.clone()));
    }

    let mut seen = HashSet::new();
    for (index, node) in config.nodes.iter().enumerate() {
        if node.hostname.is_empty() || node.service.is_empty() {
            errors.push(ValidationError::Node {
                index,
                reason: "hostname and service must be non-empty".into(),
            });
        }
        if let Err(e) = url::Host::parse(&node.ip) {
            errors.push(ValidationError::Node {
                index,
                reason: format!("invalid ip `{}`: {}", node.ip, e),
            });
        }
        if node.port == 0 {
            errors.push(ValidationError::Node {
                index,
                reason: "port must be non-zero".into(),
            });
        }

        let key = node_key(&config.upgrade.node_key_prefix, &node.hostname, &node.service);
        if !seen.insert(key.clone()) {
            errors.push(ValidationError::DuplicateNode { index, key });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::NodeConfig;

    fn node(hostname: &str, service: &str, ip: &str, port: u16) -> NodeConfig {
        NodeConfig {
            hostname: hostname.into(),
            service: service.into(),
            ip: ip.into(),
            port,
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-addr".into();
        config.upgrade.route_prefix = "a/b".into();
        config.upgrade.max_message_size = 0;
        config.nodes.push(node("", "chat", "10.0.0.5", 0));

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("not-an-addr".into())));
        assert!(errors.contains(&ValidationError::RoutePrefix("a/b".into())));
        assert!(errors.contains(&ValidationError::ZeroSize("max_message_size")));
        // empty hostname + zero port
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ValidationError::Node { index: 0, .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_duplicate_nodes() {
        let mut config = ProxyConfig::default();
        config.nodes.push(node("node1", "chat", "10.0.0.5", 9001));
        config.nodes.push(node("node1", "chat", "10.0.0.6", 9002));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateNode {
                index: 1,
                key: "wsnode-node1-chat".into()
            }]
        );
    }

    #[test]
    fn test_dns_names_are_accepted() {
        let mut config = ProxyConfig::default();
        config.nodes.push(node("node1", "chat", "chat.internal", 9001));
        assert!(validate_config(&config).is_ok());
    }
}
