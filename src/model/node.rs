//! Node record in the property graph.

use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// Opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node as the storage engine sees it: an identity plus named scalar
/// attributes. The entity type and stable uuid are ordinary attributes
/// (`"type"`, `"uuid"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub properties: PropertyMap,
}

impl NodeRecord {
    pub fn new(id: NodeId) -> Self {
        Self { id, properties: PropertyMap::new() }
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

    /// The declared entity type name, if stored.
    pub fn type_name(&self) -> Option<&str> {
        self.get_str("type")
    }

    /// The stable collision-resistant identifier, if already assigned.
    pub fn uuid(&self) -> Option<&str> {
        self.get_str("uuid")
    }
}
