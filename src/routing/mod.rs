//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request path ("/wsin/node1/chat/room1?x=1")
//!     → resolver.rs (prefix check, segment split)
//!     → ResolvedRoute { registry_key: "node1-chat", forward_path: "/room1?x=1" }
//!     or RouteMalformed
//! ```
//!
//! # Design Decisions
//! - Route shape is fixed: prefix, host, service, then the forwarded tail
//! - Deterministic: same input always resolves to the same route

pub mod resolver;

pub use resolver::{ResolvedRoute, RouteRequest, RouteResolver};
