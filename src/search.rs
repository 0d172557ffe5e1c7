//! Search collaborator.
//!
//! The core consumes a narrow predicate interface: given a type name and
//! one attribute/value pair, return the matching nodes. The uniqueness
//! validator and uuid-based endpoint resolution go through here.

use crate::model::{NodeRecord, Value};
use crate::storage::{GraphStore, MemoryStore};
use crate::Result;

pub trait SearchIndex: Send + Sync {
    /// Nodes matching `key == value`, optionally restricted to one entity
    /// type name.
    fn find_nodes(
        &self,
        type_name: Option<&str>,
        key: &str,
        value: &Value,
    ) -> Result<Vec<NodeRecord>>;

    /// Resolve a node by its stable uuid.
    fn node_by_uuid(&self, uuid: &str) -> Result<Option<NodeRecord>> {
        Ok(self
            .find_nodes(None, "uuid", &Value::String(uuid.to_string()))?
            .into_iter()
            .next())
    }
}

// ============================================================================
// MemoryIndex
// ============================================================================

/// Scan-based reference index over a [`MemoryStore`]. Real deployments
/// put a keyword/full-text engine behind [`SearchIndex`] instead.
pub struct MemoryIndex {
    store: MemoryStore,
}

impl MemoryIndex {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

impl SearchIndex for MemoryIndex {
    fn find_nodes(
        &self,
        type_name: Option<&str>,
        key: &str,
        value: &Value,
    ) -> Result<Vec<NodeRecord>> {
        Ok(self
            .store
            .all_nodes()?
            .into_iter()
            .filter(|n| type_name.is_none_or(|t| n.type_name() == Some(t)))
            .filter(|n| n.get(key) == Some(value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyMap;
    use crate::storage::in_tx;

    #[test]
    fn test_find_by_type_and_value() {
        let store = MemoryStore::new();
        in_tx(&store, |tx| {
            let mut a = PropertyMap::new();
            a.insert("type".into(), Value::from("Page"));
            a.insert("name".into(), Value::from("home"));
            store.create_node(tx, a)?;

            let mut b = PropertyMap::new();
            b.insert("type".into(), Value::from("Content"));
            b.insert("name".into(), Value::from("home"));
            store.create_node(tx, b)?;
            Ok(())
        })
        .unwrap();

        let index = MemoryIndex::new(store);
        let hits = index
            .find_nodes(Some("Page"), "name", &Value::from("home"))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].type_name(), Some("Page"));

        let all = index.find_nodes(None, "name", &Value::from("home")).unwrap();
        assert_eq!(all.len(), 2);
    }
}
