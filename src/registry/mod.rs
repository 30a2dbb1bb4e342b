//! Node registry subsystem.
//!
//! # Data Flow
//! ```text
//! ResolvedRoute { registry_key: "<host>-<service>" }
//!     → key "<node_key_prefix><host>-<service>"
//!     → NodeRegistry::lookup
//!     → NodeDescriptor { ip, port } or absent
//! ```
//!
//! # Design Decisions
//! - Lookup contract is a trait so other stores can back it
//! - Reads never lock; writers publish whole snapshots
//! - Absence is a value (`None`), not an error, at this layer

pub mod node;
pub mod table;

pub use node::{node_key, NodeDescriptor};
pub use table::NodeTable;

/// Read-only key → node lookup shared by every session.
pub trait NodeRegistry: Send + Sync + std::fmt::Debug {
    /// Find the node registered under `key`.
    fn lookup(&self, key: &str) -> Option<NodeDescriptor>;
}
