//! # Graph Store Trait
//!
//! This is THE contract between the schemagraph core and any storage
//! engine. Everything the property-resolution engine and the tree encoder
//! need from a backing store is defined here — node/relationship CRUD,
//! named attribute access, and coarse-grained transactions.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory reference store for testing/embedding |
//!
//! The trait is synchronous: the core assumes a thread-per-request model
//! with no cooperative scheduling, and every logical operation (subtree
//! move, creation with mandatory edges) runs inside one transaction
//! obtained from `begin_tx`.

pub mod memory;

use crate::model::*;
use crate::Result;

pub use memory::MemoryStore;

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The universal storage contract.
///
/// Reads go straight against the store; mutations require a transaction
/// handle. Implementations must make `rollback` revert every mutation
/// performed through the transaction — the validation lifecycle depends
/// on it.
pub trait GraphStore: Send + Sync + 'static {
    /// The transaction type for this store.
    type Tx;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction.
    fn begin_tx(&self) -> Result<Self::Tx>;

    /// Commit a transaction.
    fn commit(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction, reverting its mutations.
    fn rollback(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Node CRUD
    // ========================================================================

    /// Create a node with the given attributes.
    fn create_node(&self, tx: &mut Self::Tx, props: PropertyMap) -> Result<NodeId>;

    /// Get a node by id. Returns None if not found.
    fn node(&self, id: NodeId) -> Result<Option<NodeRecord>>;

    /// Delete a node. Returns true if it existed.
    /// Fails while the node still has relationships.
    fn delete_node(&self, tx: &mut Self::Tx, id: NodeId) -> Result<bool>;

    /// Delete a node and all its relationships in one operation.
    ///
    /// Default: delete each relationship, then the node.
    fn detach_delete_node(&self, tx: &mut Self::Tx, id: NodeId) -> Result<bool> {
        let rels = self.rels_of(id, Direction::Both, None)?;
        for rel in &rels {
            self.delete_rel(tx, rel.id)?;
        }
        self.delete_node(tx, id)
    }

    /// Get a named attribute of a node.
    fn node_attr(&self, id: NodeId, key: &str) -> Result<Option<Value>>;

    /// Set a named attribute on a node (upsert).
    fn set_node_attr(&self, tx: &mut Self::Tx, id: NodeId, key: &str, val: Value) -> Result<()>;

    /// Remove a named attribute from a node.
    fn remove_node_attr(&self, tx: &mut Self::Tx, id: NodeId, key: &str) -> Result<()>;

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    /// Create a relationship between two nodes.
    fn create_rel(
        &self,
        tx: &mut Self::Tx,
        src: NodeId,
        dst: NodeId,
        label: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    /// Get a relationship by id.
    fn rel(&self, id: RelId) -> Result<Option<RelRecord>>;

    /// Delete a relationship. Returns true if it existed.
    fn delete_rel(&self, tx: &mut Self::Tx, id: RelId) -> Result<bool>;

    /// Get a named attribute of a relationship.
    fn rel_attr(&self, id: RelId, key: &str) -> Result<Option<Value>>;

    /// Set a named attribute on a relationship (upsert).
    fn set_rel_attr(&self, tx: &mut Self::Tx, id: RelId, key: &str, val: Value) -> Result<()>;

    /// Remove a named attribute from a relationship.
    fn remove_rel_attr(&self, tx: &mut Self::Tx, id: RelId, key: &str) -> Result<()>;

    // ========================================================================
    // Traversal / scan
    // ========================================================================

    /// All relationships of a node, optionally filtered by direction and label.
    fn rels_of(
        &self,
        node: NodeId,
        dir: Direction,
        label: Option<&str>,
    ) -> Result<Vec<RelRecord>>;

    /// All relationships carrying a given label, graph-wide.
    ///
    /// Default: scans all nodes and collects outgoing relationships.
    fn rels_by_label(&self, label: &str) -> Result<Vec<RelRecord>> {
        let mut result = Vec::new();
        for node in self.all_nodes()? {
            result.extend(self.rels_of(node.id, Direction::Outgoing, Some(label))?);
        }
        Ok(result)
    }

    /// Return all nodes. Required — "scan everything" can't be generalized,
    /// and the reference search index is built on it.
    fn all_nodes(&self) -> Result<Vec<NodeRecord>>;

    /// Total number of nodes.
    fn node_count(&self) -> Result<u64>;

    /// Total number of relationships.
    fn rel_count(&self) -> Result<u64>;

    // ========================================================================
    // Coordination
    // ========================================================================

    /// Run `f` under the store's advisory read lock.
    ///
    /// Advisory only: callers use it defensively and must not rely on it
    /// for correctness. Default runs `f` without any lock.
    fn with_read_lock<T>(&self, f: impl FnOnce() -> T) -> T
    where
        Self: Sized,
    {
        f()
    }
}

// ============================================================================
// Transaction helper
// ============================================================================

/// Run `f` inside a fresh transaction: commit on Ok, roll back on Err.
///
/// The rollback error (if any) is swallowed in favor of the original
/// failure.
pub fn in_tx<S: GraphStore, T>(
    store: &S,
    f: impl FnOnce(&mut S::Tx) -> Result<T>,
) -> Result<T> {
    let mut tx = store.begin_tx()?;
    match f(&mut tx) {
        Ok(value) => {
            store.commit(tx)?;
            Ok(value)
        }
        Err(err) => {
            let _ = store.rollback(tx);
            Err(err)
        }
    }
}
