//! Relationship (edge) record in the property graph.

use serde::{Deserialize, Serialize};
use super::{NodeId, PropertyMap, Value};

/// Opaque relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelId(pub u64);

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traversal direction, relative to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A relationship as the storage engine sees it.
///
/// Besides declared scalar attributes, a relationship may carry context
/// position attributes: entries keyed by a context id (or a tree address
/// derived from one, or the wildcard `"*"`) whose value is an ordinal.
/// Several contexts may be present on the same edge concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelRecord {
    pub id: RelId,
    pub src: NodeId,
    pub dst: NodeId,
    pub label: String,
    pub properties: PropertyMap,
}

impl RelRecord {
    pub fn new(id: RelId, src: NodeId, dst: NodeId, label: impl Into<String>) -> Self {
        Self { id, src, dst, label: label.into(), properties: PropertyMap::new() }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.get_str("uuid")
    }

    /// The "other" end of the relationship from the given node.
    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.src { Some(self.dst) }
        else if from == self.dst { Some(self.src) }
        else { None }
    }
}
