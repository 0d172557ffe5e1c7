//! Relation declarations.
//!
//! A relation declaration binds an attribute key of a source entity type to
//! an edge traversal: label, direction and cardinality decide which edges
//! back the property, the notion decides what value they surface as.

use std::sync::Arc;

use crate::model::{Direction, NodeId, NodeRecord, PropertyMap, RelId};
use crate::schema::keys::PropKey;
use crate::schema::notion::Notion;
use crate::storage::GraphStore;
use crate::Result;

/// Edge cardinality as seen from the source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Does the source side see a collection?
    pub fn is_collection(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }

    /// May the source side hold at most one edge of this relation?
    pub fn is_to_one(&self) -> bool {
        matches!(self, Cardinality::OneToOne | Cardinality::ManyToOne)
    }
}

/// Declaration of an edge-backed property.
///
/// At most one declaration resolves a given (source type, key) pair; the
/// registry enforces this at registration time.
pub struct RelationDecl {
    /// The attribute key the relation is exposed under.
    pub key: PropKey,
    pub source_type: &'static str,
    pub target_type: &'static str,
    pub label: &'static str,
    /// Edge direction relative to the source node.
    pub direction: Direction,
    pub cardinality: Cardinality,
    pub notion: Arc<dyn Notion>,
}

impl RelationDecl {
    /// All nodes related to `node` through this declaration.
    pub fn related_records<S: GraphStore>(
        &self,
        store: &S,
        node: NodeId,
    ) -> Result<Vec<NodeRecord>> {
        let rels = store.rels_of(node, self.direction, Some(self.label))?;
        let mut records = Vec::with_capacity(rels.len());
        for rel in rels {
            let Some(other) = rel.other_node(node) else { continue };
            if let Some(record) = store.node(other)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// The single related node, if any. For to-one cardinalities this is
    /// the property value's source; for collections it is the first edge.
    pub fn related_record<S: GraphStore>(
        &self,
        store: &S,
        node: NodeId,
    ) -> Result<Option<NodeRecord>> {
        Ok(self.related_records(store, node)?.into_iter().next())
    }

    /// Create the edge realizing this relation between `source` and
    /// `target`. To-one cardinalities replace any existing edge of the
    /// declaration first, so the property keeps a single backing edge.
    pub fn create_relationship<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        source: NodeId,
        target: NodeId,
    ) -> Result<RelId> {
        if self.cardinality.is_to_one() {
            for rel in store.rels_of(source, self.direction, Some(self.label))? {
                store.delete_rel(tx, rel.id)?;
            }
        }

        let (src, dst) = match self.direction {
            Direction::Incoming => (target, source),
            Direction::Outgoing | Direction::Both => (source, target),
        };
        store.create_rel(tx, src, dst, self.label, PropertyMap::new())
    }

    /// Remove the edge(s) of this relation between `source` and `target`.
    pub fn remove_relationship<S: GraphStore>(
        &self,
        store: &S,
        tx: &mut S::Tx,
        source: NodeId,
        target: NodeId,
    ) -> Result<()> {
        for rel in store.rels_of(source, self.direction, Some(self.label))? {
            if rel.other_node(source) == Some(target) {
                store.delete_rel(tx, rel.id)?;
            }
        }
        Ok(())
    }
}
