//! Entity lifecycle: creation with transformations and validation,
//! validated modification, deletion, and bounded bulk operations.
//!
//! Each logical operation runs as one transaction; validation tokens
//! roll it back so no partial writes persist.

use chrono::Utc;
use tracing::info;

use crate::model::{PropertyMap, Value};
use crate::object::{GraphContext, NodeObject};
use crate::schema::keys::{self, PropKey};
use crate::schema::{CreationTransformation, EntityType, TransformContext, UuidCreation};
use crate::storage::{in_tx, GraphStore};
use crate::validation::{self, ErrorBuffer};
use crate::{Error, Result};

/// Relationships per transaction during bulk operations.
const BULK_BATCH_SIZE: usize = 1000;

// ============================================================================
// Creation
// ============================================================================

/// Create a node of `entity_type` with the given attributes, in one
/// transaction: stage the setter-converted attributes, run the ordered
/// creation transformations (uuid assignment first — it runs even for
/// types that never registered it), then the registered validators.
/// Any error token rolls the whole creation back.
pub fn create_node<'g, S: GraphStore>(
    cx: GraphContext<'g, S>,
    entity_type: EntityType,
    attrs: Vec<(PropKey, Value)>,
) -> Result<NodeObject<'g, S>> {
    let mut props = PropertyMap::new();
    props.insert(
        keys::core::TYPE.name().to_string(),
        Value::String(entity_type.name().to_string()),
    );
    props.insert(
        keys::core::CREATED_DATE.name().to_string(),
        Value::Int(Utc::now().timestamp_millis()),
    );
    for (key, value) in attrs {
        let converted = crate::object::convert_for_setter(cx.registry, entity_type, key, value)?;
        if !converted.is_null() {
            props.insert(key.name().to_string(), converted);
        }
    }

    run_transformations(cx, entity_type, &mut props)?;

    let id = in_tx(cx.store, |tx| {
        let id = cx.store.create_node(tx, props.clone())?;
        let node = NodeObject::attached(cx, entity_type, id);
        let mut buffer = ErrorBuffer::new();
        validation::run_registered(cx.registry, entity_type, &node, &mut buffer)?;
        buffer.into_result()?;
        Ok(id)
    })?;

    Ok(NodeObject::attached(cx, entity_type, id))
}

/// Commit a detached node built up through `set` calls: its pending map
/// goes through the same transformation/validation flow as
/// [`create_node`], and on success the object becomes attached.
pub fn save_node<S: GraphStore>(
    cx: GraphContext<'_, S>,
    node: &mut NodeObject<'_, S>,
) -> Result<()> {
    if node.is_attached() {
        return Ok(());
    }
    let entity_type = node.entity_type();
    let pending = node.take_pending();

    // pending values are already setter-converted by `set`
    let attrs: Vec<(PropKey, Value)> = pending.into_iter().collect();
    let mut props = PropertyMap::new();
    props.insert(
        keys::core::TYPE.name().to_string(),
        Value::String(entity_type.name().to_string()),
    );
    props.insert(
        keys::core::CREATED_DATE.name().to_string(),
        Value::Int(Utc::now().timestamp_millis()),
    );
    for (key, value) in attrs {
        props.insert(key.name().to_string(), value);
    }

    run_transformations(cx, entity_type, &mut props)?;

    let id = in_tx(cx.store, |tx| {
        let id = cx.store.create_node(tx, props.clone())?;
        let probe = NodeObject::attached(cx, entity_type, id);
        let mut buffer = ErrorBuffer::new();
        validation::run_registered(cx.registry, entity_type, &probe, &mut buffer)?;
        buffer.into_result()?;
        Ok(id)
    })?;

    node.attach(id);
    Ok(())
}

/// Ordered creation transformations. Uuid assignment is mandatory and
/// runs first regardless of registration; registered transformations
/// follow in ascending order (a registered order-0 uuid assignment is
/// naturally idempotent).
fn run_transformations<S: GraphStore>(
    cx: GraphContext<'_, S>,
    entity_type: EntityType,
    props: &mut PropertyMap,
) -> Result<()> {
    let tctx = TransformContext { ids: cx.ids };
    UuidCreation.apply(&tctx, props)?;
    for transformation in cx.registry.transformations(entity_type) {
        transformation.apply(&tctx, props)?;
    }
    Ok(())
}

// ============================================================================
// Modification
// ============================================================================

/// Apply several attribute writes and the type's validators as one
/// transaction. A validation token rolls every write back.
pub fn update_node<S: GraphStore>(
    cx: GraphContext<'_, S>,
    node: &mut NodeObject<'_, S>,
    changes: Vec<(PropKey, Value)>,
) -> Result<()> {
    if !node.is_attached() {
        return Err(Error::Tx("update requires a committed node".into()));
    }
    let entity_type = node.entity_type();

    in_tx(cx.store, |tx| {
        for (key, value) in &changes {
            node.apply_scalar_in_tx(tx, *key, value.clone())?;
        }
        let mut buffer = ErrorBuffer::new();
        validation::run_registered(cx.registry, entity_type, &*node, &mut buffer)?;
        buffer.into_result()?;
        Ok(())
    })
}

// ============================================================================
// Deletion
// ============================================================================

/// Delete a node that has no remaining relationships. Consumes the
/// object; its caches die with it.
pub fn delete_node<S: GraphStore>(cx: GraphContext<'_, S>, node: NodeObject<'_, S>) -> Result<bool> {
    let id = node
        .node_id()
        .ok_or_else(|| Error::Tx("delete requires a committed node".into()))?;
    in_tx(cx.store, |tx| cx.store.delete_node(tx, id))
}

/// Delete a node and all its relationships in one transaction.
pub fn detach_delete_node<S: GraphStore>(
    cx: GraphContext<'_, S>,
    node: NodeObject<'_, S>,
) -> Result<bool> {
    let id = node
        .node_id()
        .ok_or_else(|| Error::Tx("delete requires a committed node".into()))?;
    in_tx(cx.store, |tx| cx.store.detach_delete_node(tx, id))
}

// ============================================================================
// Bulk operations
// ============================================================================

/// Copy `source_key` to `dest_key` on every relationship of `label`,
/// committing in bounded batches so transaction size stays flat. Only
/// relationships managed by this core (carrying a uuid) are touched.
///
/// Partial progress across a crash is visible; re-running is idempotent.
pub fn bulk_copy_rel_attr<S: GraphStore>(
    store: &S,
    label: &str,
    source_key: &str,
    dest_key: &str,
) -> Result<u64> {
    let rels = store.rels_by_label(label)?;
    let mut copied = 0u64;

    for chunk in rels.chunks(BULK_BATCH_SIZE) {
        copied += in_tx(store, |tx| {
            let mut in_chunk = 0u64;
            for rel in chunk {
                if rel.uuid().is_none() {
                    continue;
                }
                if let Some(value) = rel.get(source_key) {
                    store.set_rel_attr(tx, rel.id, dest_key, value.clone())?;
                    in_chunk += 1;
                }
            }
            Ok(in_chunk)
        })?;
        info!(copied, label, "bulk attribute copy committed batch");
    }

    Ok(copied)
}
