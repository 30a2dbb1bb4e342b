//! Upgrade path → route resolution.
//!
//! # Responsibilities
//! - Check the fixed prefix segment (`wsin` by default)
//! - Extract the host and service segments
//! - Hand back everything after them as the forward path
//!
//! # Design Decisions
//! - Pure: no I/O, no registry access
//! - No normalization or percent-decoding; segments are taken as sent
//! - Query string travels with the forward path

use crate::error::ProxyError;

/// The part of an inbound request the resolver looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    /// Path plus optional `?query`, as received.
    pub raw_path: String,
}

impl RouteRequest {
    pub fn new(raw_path: impl Into<String>) -> Self {
        Self {
            raw_path: raw_path.into(),
        }
    }
}

/// Result of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// `<host>-<service>`; never empty.
    pub registry_key: String,
    /// Path (and query) to request on the upstream; always starts with `/`.
    pub forward_path: String,
}

/// Splits `/<prefix>/<host>/<service>/<rest...>` into a route.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    prefix: String,
}

impl RouteResolver {
    /// Create a resolver for the given first path segment.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolve a request path into a registry key and forward path.
    pub fn resolve(&self, request: &RouteRequest) -> Result<ResolvedRoute, ProxyError> {
        let raw = request.raw_path.as_str();
        let malformed = |reason: &'static str| ProxyError::RouteMalformed {
            path: raw.to_string(),
            reason,
        };

        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (raw, None),
        };

        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| malformed("path must be absolute"))?;

        let mut segments = rest.splitn(4, '/');
        match segments.next() {
            Some(prefix) if prefix == self.prefix => {}
            _ => return Err(malformed("unknown route prefix")),
        }
        let host = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("missing host segment"))?;
        let service = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("missing service segment"))?;
        let tail = segments.next().unwrap_or("");

        let mut forward_path = format!("/{}", tail);
        if let Some(query) = query {
            forward_path.push('?');
            forward_path.push_str(query);
        }

        Ok(ResolvedRoute {
            registry_key: format!("{}-{}", host, service),
            forward_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(path: &str) -> Result<ResolvedRoute, ProxyError> {
        RouteResolver::new("wsin").resolve(&RouteRequest::new(path))
    }

    #[test]
    fn test_resolves_key_and_forward_path() {
        let route = resolve("/wsin/node1/chat/room1").unwrap();
        assert_eq!(route.registry_key, "node1-chat");
        assert_eq!(route.forward_path, "/room1");
    }

    #[test]
    fn test_keeps_nested_tail_verbatim() {
        let route = resolve("/wsin/h/s/a/b/../c%20d/").unwrap();
        assert_eq!(route.registry_key, "h-s");
        assert_eq!(route.forward_path, "/a/b/../c%20d/");
    }

    #[test]
    fn test_empty_tail_forwards_root() {
        assert_eq!(resolve("/wsin/h/s").unwrap().forward_path, "/");
        assert_eq!(resolve("/wsin/h/s/").unwrap().forward_path, "/");
    }

    #[test]
    fn test_query_is_forwarded() {
        let route = resolve("/wsin/h/s/room?token=abc&x=1").unwrap();
        assert_eq!(route.forward_path, "/room?token=abc&x=1");

        let route = resolve("/wsin/h/s?token=abc").unwrap();
        assert_eq!(route.forward_path, "/?token=abc");
    }

    #[test]
    fn test_too_few_segments_is_malformed() {
        for path in ["/wsin", "/wsin/", "/wsin/node1", "/wsin/node1/", "/wsin//chat"] {
            match resolve(path) {
                Err(ProxyError::RouteMalformed { path: p, .. }) => assert_eq!(p, path),
                other => panic!("{} should be malformed, got {:?}", path, other),
            }
        }
    }

    #[test]
    fn test_wrong_prefix_is_malformed() {
        assert!(matches!(
            resolve("/other/node1/chat/room1"),
            Err(ProxyError::RouteMalformed { .. })
        ));
        assert!(matches!(
            resolve("wsin/node1/chat"),
            Err(ProxyError::RouteMalformed { .. })
        ));
    }

    #[test]
    fn test_custom_prefix() {
        let resolver = RouteResolver::new("ws");
        let route = resolver.resolve(&RouteRequest::new("/ws/a/b/c")).unwrap();
        assert_eq!(route.registry_key, "a-b");
        assert_eq!(route.forward_path, "/c");
        assert_eq!(resolver.prefix(), "ws");
    }
}
