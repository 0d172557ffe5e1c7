//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`. It uses simple
//! HashMaps protected by RwLock, with an undo log per transaction so that
//! `rollback` genuinely reverts mutations — the validation lifecycle
//! aborts by rolling back, and tests observe that no partial writes
//! persist.
//!
//! ## Limitations
//!
//! - **Single-writer only**: per-collection locks mean concurrent
//!   multi-step mutations are not isolated from each other. Safe for
//!   single-threaded or read-heavy use only.
//! - **No property indexes**: attribute lookups scan. The companion
//!   `MemoryIndex` search collaborator scans too.
//!
//! Use this store for testing the property-resolution engine and the tree
//! encoder, and for embedding without persistence.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::model::*;
use crate::{Error, Result};
use super::GraphStore;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory property graph storage. Cloning is cheap and shares the
/// underlying graph (the companion `MemoryIndex` holds a clone).
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, NodeRecord>>,
    rels: RwLock<HashMap<RelId, RelRecord>>,
    /// node id → relationship ids touching it
    adjacency: RwLock<HashMap<NodeId, Vec<RelId>>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
    /// advisory read lock, see `GraphStore::with_read_lock`
    advisory: RwLock<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                rels: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
                advisory: RwLock::new(()),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx — undo log
// ============================================================================

/// One inverse operation per mutation, applied in reverse on rollback.
enum UndoOp {
    RemoveNode(NodeId),
    RestoreNode(NodeRecord),
    RemoveRel(RelId),
    RestoreRel(RelRecord),
    RestoreNodeAttr { id: NodeId, key: String, prev: Option<Value> },
    RestoreRelAttr { id: RelId, key: String, prev: Option<Value> },
}

/// In-memory transaction: mutations apply immediately and are journaled
/// for rollback.
pub struct MemoryTx {
    undo: Vec<UndoOp>,
}

impl MemoryInner {
    fn unwind(&self, mut undo: Vec<UndoOp>) {
        while let Some(op) = undo.pop() {
            match op {
                UndoOp::RemoveNode(id) => {
                    self.nodes.write().remove(&id);
                    self.adjacency.write().remove(&id);
                }
                UndoOp::RestoreNode(node) => {
                    self.adjacency.write().entry(node.id).or_default();
                    self.nodes.write().insert(node.id, node);
                }
                UndoOp::RemoveRel(id) => {
                    if let Some(rel) = self.rels.write().remove(&id) {
                        let mut adj = self.adjacency.write();
                        if let Some(ids) = adj.get_mut(&rel.src) {
                            ids.retain(|rid| *rid != id);
                        }
                        if rel.src != rel.dst {
                            if let Some(ids) = adj.get_mut(&rel.dst) {
                                ids.retain(|rid| *rid != id);
                            }
                        }
                    }
                }
                UndoOp::RestoreRel(rel) => {
                    let mut adj = self.adjacency.write();
                    adj.entry(rel.src).or_default().push(rel.id);
                    if rel.src != rel.dst {
                        adj.entry(rel.dst).or_default().push(rel.id);
                    }
                    drop(adj);
                    self.rels.write().insert(rel.id, rel);
                }
                UndoOp::RestoreNodeAttr { id, key, prev } => {
                    if let Some(node) = self.nodes.write().get_mut(&id) {
                        match prev {
                            Some(v) => { node.properties.insert(key, v); }
                            None => { node.properties.remove(&key); }
                        }
                    }
                }
                UndoOp::RestoreRelAttr { id, key, prev } => {
                    if let Some(rel) = self.rels.write().get_mut(&id) {
                        match prev {
                            Some(v) => { rel.properties.insert(key, v); }
                            None => { rel.properties.remove(&key); }
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

impl GraphStore for MemoryStore {
    type Tx = MemoryTx;

    fn begin_tx(&self) -> Result<MemoryTx> {
        Ok(MemoryTx { undo: Vec::new() })
    }

    fn commit(&self, _tx: MemoryTx) -> Result<()> {
        Ok(())
    }

    fn rollback(&self, tx: MemoryTx) -> Result<()> {
        self.inner.unwind(tx.undo);
        Ok(())
    }

    // ========================================================================
    // Node CRUD
    // ========================================================================

    fn create_node(&self, tx: &mut MemoryTx, props: PropertyMap) -> Result<NodeId> {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = NodeRecord { id, properties: props };

        self.inner.nodes.write().insert(id, node);
        self.inner.adjacency.write().insert(id, Vec::new());
        tx.undo.push(UndoOp::RemoveNode(id));

        Ok(id)
    }

    fn node(&self, id: NodeId) -> Result<Option<NodeRecord>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    fn delete_node(&self, tx: &mut MemoryTx, id: NodeId) -> Result<bool> {
        {
            let adj = self.inner.adjacency.read();
            if let Some(rels) = adj.get(&id) {
                if !rels.is_empty() {
                    return Err(Error::Storage(format!(
                        "Cannot delete node {id} with {} relationships. Delete relationships first.",
                        rels.len()
                    )));
                }
            }
        }

        let removed = self.inner.nodes.write().remove(&id);
        self.inner.adjacency.write().remove(&id);

        if let Some(node) = removed {
            tx.undo.push(UndoOp::RestoreNode(node));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn node_attr(&self, id: NodeId, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.nodes.read().get(&id).and_then(|n| n.properties.get(key).cloned()))
    }

    fn set_node_attr(&self, tx: &mut MemoryTx, id: NodeId, key: &str, val: Value) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        let prev = node.properties.insert(key.to_string(), val);
        tx.undo.push(UndoOp::RestoreNodeAttr { id, key: key.to_string(), prev });
        Ok(())
    }

    fn remove_node_attr(&self, tx: &mut MemoryTx, id: NodeId, key: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        let prev = node.properties.remove(key);
        tx.undo.push(UndoOp::RestoreNodeAttr { id, key: key.to_string(), prev });
        Ok(())
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    fn create_rel(
        &self,
        tx: &mut MemoryTx,
        src: NodeId,
        dst: NodeId,
        label: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::NotFound(format!("Source node {src}")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::NotFound(format!("Target node {dst}")));
            }
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let rel = RelRecord {
            id,
            src,
            dst,
            label: label.to_string(),
            properties: props,
        };

        self.inner.rels.write().insert(id, rel);

        let mut adj = self.inner.adjacency.write();
        adj.entry(src).or_default().push(id);
        if src != dst {
            adj.entry(dst).or_default().push(id);
        }
        drop(adj);

        tx.undo.push(UndoOp::RemoveRel(id));
        Ok(id)
    }

    fn rel(&self, id: RelId) -> Result<Option<RelRecord>> {
        Ok(self.inner.rels.read().get(&id).cloned())
    }

    fn delete_rel(&self, tx: &mut MemoryTx, id: RelId) -> Result<bool> {
        let removed = self.inner.rels.write().remove(&id);
        if let Some(rel) = removed {
            let mut adj = self.inner.adjacency.write();
            if let Some(ids) = adj.get_mut(&rel.src) {
                ids.retain(|rid| *rid != id);
            }
            if rel.src != rel.dst {
                if let Some(ids) = adj.get_mut(&rel.dst) {
                    ids.retain(|rid| *rid != id);
                }
            }
            drop(adj);
            tx.undo.push(UndoOp::RestoreRel(rel));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn rel_attr(&self, id: RelId, key: &str) -> Result<Option<Value>> {
        Ok(self.inner.rels.read().get(&id).and_then(|r| r.properties.get(key).cloned()))
    }

    fn set_rel_attr(&self, tx: &mut MemoryTx, id: RelId, key: &str, val: Value) -> Result<()> {
        let mut rels = self.inner.rels.write();
        let rel = rels.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
        let prev = rel.properties.insert(key.to_string(), val);
        tx.undo.push(UndoOp::RestoreRelAttr { id, key: key.to_string(), prev });
        Ok(())
    }

    fn remove_rel_attr(&self, tx: &mut MemoryTx, id: RelId, key: &str) -> Result<()> {
        let mut rels = self.inner.rels.write();
        let rel = rels.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
        let prev = rel.properties.remove(key);
        tx.undo.push(UndoOp::RestoreRelAttr { id, key: key.to_string(), prev });
        Ok(())
    }

    // ========================================================================
    // Traversal / scan
    // ========================================================================

    fn rels_of(
        &self,
        node: NodeId,
        dir: Direction,
        label: Option<&str>,
    ) -> Result<Vec<RelRecord>> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.rels.read();

        let rel_ids = adj.get(&node).cloned().unwrap_or_default();
        let mut result = Vec::new();

        for rid in rel_ids {
            if let Some(rel) = rels.get(&rid) {
                let matches_dir = match dir {
                    Direction::Outgoing => rel.src == node,
                    Direction::Incoming => rel.dst == node,
                    Direction::Both => true,
                };
                let matches_label = label.is_none_or(|l| rel.label == l);

                if matches_dir && matches_label {
                    result.push(rel.clone());
                }
            }
        }

        Ok(result)
    }

    fn rels_by_label(&self, label: &str) -> Result<Vec<RelRecord>> {
        Ok(self
            .inner
            .rels
            .read()
            .values()
            .filter(|r| r.label == label)
            .cloned()
            .collect())
    }

    fn all_nodes(&self) -> Result<Vec<NodeRecord>> {
        Ok(self.inner.nodes.read().values().cloned().collect())
    }

    fn node_count(&self) -> Result<u64> {
        Ok(self.inner.nodes.read().len() as u64)
    }

    fn rel_count(&self) -> Result<u64> {
        Ok(self.inner.rels.read().len() as u64)
    }

    fn with_read_lock<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.inner.advisory.read();
        f()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::in_tx;

    fn props(pairs: &[(&str, Value)]) -> PropertyMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_create_and_get_node() {
        let db = MemoryStore::new();
        let id = in_tx(&db, |tx| {
            db.create_node(tx, props(&[("name", Value::from("Ada"))]))
        })
        .unwrap();

        let node = db.node(id).unwrap().unwrap();
        assert_eq!(node.get("name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn test_create_relationship() {
        let db = MemoryStore::new();
        let (a, b, rel_id) = in_tx(&db, |tx| {
            let a = db.create_node(tx, PropertyMap::new())?;
            let b = db.create_node(tx, PropertyMap::new())?;
            let r = db.create_rel(tx, a, b, "CONTAINS", PropertyMap::new())?;
            Ok((a, b, r))
        })
        .unwrap();

        let rel = db.rel(rel_id).unwrap().unwrap();
        assert_eq!(rel.src, a);
        assert_eq!(rel.dst, b);
        assert_eq!(rel.label, "CONTAINS");
    }

    #[test]
    fn test_cannot_delete_connected_node() {
        let db = MemoryStore::new();
        let a = in_tx(&db, |tx| {
            let a = db.create_node(tx, PropertyMap::new())?;
            let b = db.create_node(tx, PropertyMap::new())?;
            db.create_rel(tx, a, b, "CONTAINS", PropertyMap::new())?;
            Ok(a)
        })
        .unwrap();

        let mut tx = db.begin_tx().unwrap();
        assert!(db.delete_node(&mut tx, a).is_err());
        db.rollback(tx).unwrap();
    }

    #[test]
    fn test_detach_delete_node() {
        let db = MemoryStore::new();
        let a = in_tx(&db, |tx| {
            let a = db.create_node(tx, PropertyMap::new())?;
            let b = db.create_node(tx, PropertyMap::new())?;
            db.create_rel(tx, a, b, "CONTAINS", PropertyMap::new())?;
            Ok(a)
        })
        .unwrap();

        in_tx(&db, |tx| db.detach_delete_node(tx, a)).unwrap();
        assert!(db.node(a).unwrap().is_none());
        assert_eq!(db.rel_count().unwrap(), 0);
    }

    #[test]
    fn test_rollback_reverts_creation() {
        let db = MemoryStore::new();
        let mut tx = db.begin_tx().unwrap();
        let id = db.create_node(&mut tx, props(&[("name", Value::from("ghost"))])).unwrap();
        db.rollback(tx).unwrap();

        assert!(db.node(id).unwrap().is_none());
        assert_eq!(db.node_count().unwrap(), 0);
    }

    #[test]
    fn test_rollback_reverts_attr_change() {
        let db = MemoryStore::new();
        let id = in_tx(&db, |tx| {
            db.create_node(tx, props(&[("name", Value::from("before"))]))
        })
        .unwrap();

        let mut tx = db.begin_tx().unwrap();
        db.set_node_attr(&mut tx, id, "name", Value::from("after")).unwrap();
        db.set_node_attr(&mut tx, id, "extra", Value::from(1)).unwrap();
        db.rollback(tx).unwrap();

        let node = db.node(id).unwrap().unwrap();
        assert_eq!(node.get("name"), Some(&Value::from("before")));
        assert_eq!(node.get("extra"), None);
    }

    #[test]
    fn test_rollback_restores_deleted_rel() {
        let db = MemoryStore::new();
        let rel_id = in_tx(&db, |tx| {
            let a = db.create_node(tx, PropertyMap::new())?;
            let b = db.create_node(tx, PropertyMap::new())?;
            db.create_rel(tx, a, b, "CONTAINS", props(&[("p", Value::from(3))]))
        })
        .unwrap();

        let mut tx = db.begin_tx().unwrap();
        db.delete_rel(&mut tx, rel_id).unwrap();
        db.rollback(tx).unwrap();

        let rel = db.rel(rel_id).unwrap().unwrap();
        assert_eq!(rel.get("p"), Some(&Value::from(3)));
        // adjacency restored too
        assert_eq!(db.rels_of(rel.src, Direction::Outgoing, None).unwrap().len(), 1);
    }

    #[test]
    fn test_rels_of_direction_filter() {
        let db = MemoryStore::new();
        let (a, b) = in_tx(&db, |tx| {
            let a = db.create_node(tx, PropertyMap::new())?;
            let b = db.create_node(tx, PropertyMap::new())?;
            db.create_rel(tx, a, b, "CONTAINS", PropertyMap::new())?;
            Ok((a, b))
        })
        .unwrap();

        assert_eq!(db.rels_of(a, Direction::Outgoing, None).unwrap().len(), 1);
        assert_eq!(db.rels_of(a, Direction::Incoming, None).unwrap().len(), 0);
        assert_eq!(db.rels_of(b, Direction::Incoming, Some("CONTAINS")).unwrap().len(), 1);
        assert_eq!(db.rels_of(b, Direction::Incoming, Some("OWNS")).unwrap().len(), 0);
    }

    #[test]
    fn test_rels_by_label() {
        let db = MemoryStore::new();
        in_tx(&db, |tx| {
            let a = db.create_node(tx, PropertyMap::new())?;
            let b = db.create_node(tx, PropertyMap::new())?;
            let c = db.create_node(tx, PropertyMap::new())?;
            db.create_rel(tx, a, b, "CONTAINS", PropertyMap::new())?;
            db.create_rel(tx, b, c, "OWNS", PropertyMap::new())?;
            db.create_rel(tx, a, c, "CONTAINS", PropertyMap::new())?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.rels_by_label("CONTAINS").unwrap().len(), 2);
        assert_eq!(db.rels_by_label("OWNS").unwrap().len(), 1);
    }
}
