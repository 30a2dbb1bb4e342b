//! Snapshot-swapped node table.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::NodeConfig;
use crate::registry::node::NodeDescriptor;
use crate::registry::NodeRegistry;

/// In-memory registry backed by an atomically swapped map.
///
/// Readers load the current snapshot without taking a lock; [`NodeTable::replace`]
/// publishes a whole new map, so a lookup sees either the old table or the new
/// one, never a mix.
#[derive(Debug)]
pub struct NodeTable {
    key_prefix: String,
    nodes: ArcSwap<HashMap<String, NodeDescriptor>>,
}

impl NodeTable {
    /// Create a table from configured nodes.
    pub fn new(key_prefix: impl Into<String>, nodes: &[NodeConfig]) -> Self {
        let key_prefix = key_prefix.into();
        let map = Self::build(&key_prefix, nodes);
        Self {
            key_prefix,
            nodes: ArcSwap::from_pointee(map),
        }
    }

    fn build(key_prefix: &str, nodes: &[NodeConfig]) -> HashMap<String, NodeDescriptor> {
        nodes
            .iter()
            .map(|config| {
                let node = NodeDescriptor::from_config(key_prefix, config);
                (node.key.clone(), node)
            })
            .collect()
    }

    /// Swap in a new set of nodes.
    pub fn replace(&self, nodes: &[NodeConfig]) {
        let map = Self::build(&self.key_prefix, nodes);
        let count = map.len();
        self.nodes.store(Arc::new(map));
        tracing::info!(nodes = count, "Node table replaced");
    }

    /// Number of registered nodes in the current snapshot.
    pub fn len(&self) -> usize {
        self.nodes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NodeRegistry for NodeTable {
    fn lookup(&self, key: &str) -> Option<NodeDescriptor> {
        self.nodes.load().get(key).cloned()
    }
}
