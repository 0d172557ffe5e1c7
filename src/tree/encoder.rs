//! Tree position encoder operations.
//!
//! One shared subtree can be referenced from several logical contexts at
//! once; each context keeps its own child ordering because position is
//! encoded as a per-context attribute on the connecting edge, not as one
//! absolute index. The operations here enumerate and sort children per
//! context, re-address subtrees when they gain a context, renumber
//! siblings, and migrate legacy data into the scheme.

use hashbrown::HashSet;
use tracing::{info, warn};

use crate::model::{NodeId, PropertyMap, RelId, RelRecord, Value};
use crate::object::{GraphContext, RelObject};
use crate::schema::keys;
use crate::schema::GENERIC_REL;
use crate::search::SearchIndex;
use crate::storage::{in_tx, GraphStore};
use crate::{Error, Result};

use super::address::{context_of, is_context_key, is_tree_address, TreeAddress, WILDCARD};

// ============================================================================
// TreePolicy
// ============================================================================

/// Names the encoder needs from the surrounding schema: the containment
/// label, the node kinds the component filter distinguishes, and the
/// traversal depth bound.
pub struct TreePolicy {
    pub contains_label: &'static str,
    pub content_type: &'static str,
    pub component_type: &'static str,
    pub max_depth: usize,
}

impl Default for TreePolicy {
    fn default() -> Self {
        Self {
            contains_label: "CONTAINS",
            content_type: "Content",
            component_type: "Component",
            max_depth: 64,
        }
    }
}

// ============================================================================
// Position lookup
// ============================================================================

/// The ordinal of an edge under `address`: the exact-match attribute
/// first, the wildcard second, `None` when the edge carries neither
/// (excluded from that context's child list).
pub fn resolve_position(rel: &RelRecord, address: &str) -> Result<Option<i64>> {
    if let Some(value) = rel.get(address) {
        return normalize_position(address, value).map(Some);
    }
    if let Some(value) = rel.get(WILDCARD) {
        return normalize_position(WILDCARD, value).map(Some);
    }
    Ok(None)
}

/// Positions are stored as integer or numeric string; anything else is a
/// fatal schema-misuse condition.
fn normalize_position(key: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::String(s) => s.trim().parse().map_err(|_| Error::MalformedPosition {
            key: key.to_string(),
            detail: format!("'{s}' is not an integer"),
        }),
        other => Err(Error::MalformedPosition {
            key: key.to_string(),
            detail: format!("expected INTEGER or numeric STRING, got {}", other.type_name()),
        }),
    }
}

/// Descend one level: the child address of `rel` under `address`. Falls
/// back to a position keyed by the bare context id for edges predating
/// full addresses.
pub fn expand_address(rel: &RelRecord, address: &TreeAddress) -> Result<TreeAddress> {
    let position = match resolve_position(rel, &address.to_string())? {
        Some(p) => p,
        None => resolve_position(rel, address.context_id())?.ok_or_else(|| {
            Error::NotFound(format!("no position for {address} on relationship {}", rel.id))
        })?,
    };
    Ok(address.expand(position))
}

// ============================================================================
// Child enumeration
// ============================================================================

/// Outgoing containment edges of `node` that belong to `address`'s
/// context, sorted ascending by resolved position (stable: edges with
/// equal positions keep presence order).
///
/// With `address = None` every containment edge with a live target
/// qualifies, unsorted. With a `component_filter`, content and component
/// targets are restricted: literal content nodes (no data-key marker)
/// pass, others need a matching componentId tag on the edge.
pub fn child_relationships<S: GraphStore>(
    store: &S,
    node: NodeId,
    address: Option<&str>,
    component_filter: Option<&str>,
    policy: &TreePolicy,
) -> Result<Vec<RelRecord>> {
    // advisory only; enumeration stays correct without it
    store.with_read_lock(|| child_relationships_inner(store, node, address, component_filter, policy))
}

fn child_relationships_inner<S: GraphStore>(
    store: &S,
    node: NodeId,
    address: Option<&str>,
    component_filter: Option<&str>,
    policy: &TreePolicy,
) -> Result<Vec<RelRecord>> {
    let mut selected = Vec::new();

    for rel in store.rels_of(node, crate::model::Direction::Outgoing, Some(policy.contains_label))? {
        let in_context = match address {
            None => true,
            Some(addr) => rel.properties.contains_key(addr) || rel.properties.contains_key(WILDCARD),
        };
        if !in_context {
            continue;
        }

        let Some(target) = store.node(rel.dst)? else { continue };

        if let Some(cid) = component_filter {
            let target_type = target.type_name().unwrap_or("");
            if target_type == policy.content_type || target_type == policy.component_type {
                let literal_content = target_type == policy.content_type
                    && target.get(keys::tree::DATA_KEY.name()).is_none();
                let tagged = rel.get_str(keys::rel::COMPONENT_ID.name()) == Some(cid);
                if literal_content || tagged {
                    selected.push(rel);
                }
                continue;
            }
        }

        selected.push(rel);
    }

    if let Some(addr) = address {
        let mut keyed = Vec::with_capacity(selected.len());
        for rel in selected {
            let position = resolve_position(&rel, addr)?.unwrap_or(0);
            keyed.push((position, rel));
        }
        keyed.sort_by_key(|(position, _)| *position);
        return Ok(keyed.into_iter().map(|(_, rel)| rel).collect());
    }

    Ok(selected)
}

/// The child nodes behind [`child_relationships`], in the same order.
pub fn child_nodes<S: GraphStore>(
    store: &S,
    node: NodeId,
    address: Option<&str>,
    component_filter: Option<&str>,
    policy: &TreePolicy,
) -> Result<Vec<crate::model::NodeRecord>> {
    let mut nodes = Vec::new();
    for rel in child_relationships(store, node, address, component_filter, policy)? {
        if let Some(record) = store.node(rel.dst)? {
            nodes.push(record);
        }
    }
    Ok(nodes)
}

/// The next free ordinal under `address` among `parent`'s children,
/// never below `minimum`.
pub fn next_position<S: GraphStore>(
    store: &S,
    parent: NodeId,
    address: &str,
    minimum: i64,
    policy: &TreePolicy,
) -> Result<i64> {
    let mut next = minimum;
    for rel in store.rels_of(parent, crate::model::Direction::Outgoing, Some(policy.contains_label))? {
        if let Some(position) = resolve_position(&rel, address)? {
            next = next.max(position + 1);
        }
    }
    Ok(next)
}

// ============================================================================
// Membership changes
// ============================================================================

/// Put `child` under `parent` in `address`'s context, appending it at the
/// next free position.
///
/// An existing containment edge between the two is tagged with the new
/// context instead of duplicated; otherwise an edge is created (subject
/// to duplicate prevention — `Ok(None)` when creation found an identical
/// edge).
pub fn attach_child<'g, S: GraphStore>(
    cx: GraphContext<'g, S>,
    parent: NodeId,
    child: NodeId,
    address: &str,
    policy: &TreePolicy,
) -> Result<Option<RelId>> {
    let store = cx.store;
    let position = next_position(store, parent, address, 0, policy)?;

    let existing = store
        .rels_of(child, crate::model::Direction::Incoming, Some(policy.contains_label))?
        .into_iter()
        .find(|rel| rel.src == parent);

    if let Some(rel) = existing {
        in_tx(store, |tx| {
            store.set_rel_attr(tx, rel.id, address, Value::Int(position))
        })?;
        return Ok(Some(rel.id));
    }

    let mut props = PropertyMap::new();
    props.insert(address.to_string(), Value::Int(position));
    let created = RelObject::create(cx, GENERIC_REL, parent, child, policy.contains_label, props)?;
    Ok(created.map(|rel| rel.rel_id()))
}

/// Drop an edge's position attribute for one context.
///
/// Stale context entries whose context node no longer exists are cleaned
/// up on the way. When no context entry remains, the edge existed only to
/// represent membership and is deleted; positions for other contexts are
/// left untouched. Returns whether the edge was deleted.
pub fn remove_from_context<S: GraphStore>(
    store: &S,
    index: &dyn SearchIndex,
    rel_id: RelId,
    address_key: &str,
) -> Result<bool> {
    in_tx(store, |tx| {
        let rel = store
            .rel(rel_id)?
            .ok_or_else(|| Error::NotFound(format!("Relationship {rel_id}")))?;

        store.remove_rel_attr(tx, rel_id, address_key)?;

        let mut remaining = 0usize;
        for key in rel.properties.keys() {
            if key == address_key || !is_context_key(key) {
                continue;
            }
            if key == WILDCARD {
                remaining += 1;
                continue;
            }
            if index.node_by_uuid(context_of(key))?.is_some() {
                remaining += 1;
            } else {
                info!(key = key.as_str(), "removing stale context entry for vanished context");
                store.remove_rel_attr(tx, rel_id, key)?;
            }
        }

        if remaining == 0 {
            store.delete_rel(tx, rel_id)?;
            Ok(true)
        } else {
            Ok(false)
        }
    })
}

/// Renumber `parent`'s children under `address` to the gap-free sequence
/// 0..n, keeping their current order.
pub fn reorder_children<S: GraphStore>(
    store: &S,
    parent: NodeId,
    address: &str,
    policy: &TreePolicy,
) -> Result<()> {
    let rels = child_relationships(store, parent, Some(address), None, policy)?;
    in_tx(store, |tx| {
        for (ordinal, rel) in rels.iter().enumerate() {
            store.set_rel_attr(tx, rel.id, address, Value::Int(ordinal as i64))?;
        }
        Ok(())
    })
}

// ============================================================================
// Re-addressing
// ============================================================================

/// Give the subtree under `root` an equivalent set of position attributes
/// for a second context: every edge attribute keyed by `old_prefix` (the
/// address or any deeper address under it) gains a copy keyed by
/// `new_prefix`, recursively. Non-destructive — the old context keeps its
/// attributes, because it may still reference the subtree.
///
/// Traversal is bounded by the policy's max depth and a visited set, so
/// cyclic containment cannot loop. Returns the number of attributes
/// copied; runs as one transaction.
pub fn retag_subtree<S: GraphStore>(
    store: &S,
    root: NodeId,
    old_prefix: &str,
    new_prefix: &str,
    policy: &TreePolicy,
) -> Result<u64> {
    let deeper = format!("{old_prefix}_");

    in_tx(store, |tx| {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![(root, 0usize)];
        let mut copied = 0u64;

        while let Some((node, depth)) = stack.pop() {
            if depth > policy.max_depth {
                warn!(max_depth = policy.max_depth, "subtree exceeds depth bound, not re-addressed below");
                continue;
            }
            if !visited.insert(node) {
                continue;
            }

            for rel in store.rels_of(node, crate::model::Direction::Outgoing, Some(policy.contains_label))? {
                for (key, value) in &rel.properties {
                    if key == old_prefix || key.starts_with(&deeper) {
                        let new_key = format!("{new_prefix}{}", &key[old_prefix.len()..]);
                        store.set_rel_attr(tx, rel.id, &new_key, value.clone())?;
                        copied += 1;
                    }
                }
                stack.push((rel.dst, depth + 1));
            }
        }

        Ok(copied)
    })
}

// ============================================================================
// Context membership / legacy migration
// ============================================================================

/// The context ids referencing `node` through incoming containment edges.
pub fn contexts_of<S: GraphStore>(
    store: &S,
    node: NodeId,
    policy: &TreePolicy,
) -> Result<Vec<String>> {
    let mut contexts: Vec<String> = Vec::new();
    for rel in store.rels_of(node, crate::model::Direction::Incoming, Some(policy.contains_label))? {
        for key in rel.properties.keys() {
            if is_tree_address(key) {
                let context = context_of(key);
                if !contexts.iter().any(|c| c == context) {
                    contexts.push(context.to_string());
                }
            }
        }
    }
    Ok(contexts)
}

/// Lazy migration for data predating the scheme: when no edge in the
/// subtree carries any context-keyed attribute, derive an address set by
/// depth-first structural position and persist it under `context_id`.
/// Returns whether a migration ran.
pub fn derive_addresses<S: GraphStore>(
    store: &S,
    context_id: &str,
    root: NodeId,
    policy: &TreePolicy,
) -> Result<bool> {
    // first pass: any context-keyed attribute anywhere?
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        if depth > policy.max_depth || !visited.insert(node) {
            continue;
        }
        for rel in store.rels_of(node, crate::model::Direction::Outgoing, Some(policy.contains_label))? {
            if rel.properties.keys().any(|k| is_context_key(k)) {
                return Ok(false);
            }
            stack.push((rel.dst, depth + 1));
        }
    }

    // second pass: synthesize positions from structural order
    let tagged = in_tx(store, |tx| {
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![(root, TreeAddress::root(context_id), 0usize)];
        let mut tagged = 0u64;

        while let Some((node, address, depth)) = stack.pop() {
            if depth > policy.max_depth || !visited.insert(node) {
                continue;
            }
            let rels = store.rels_of(node, crate::model::Direction::Outgoing, Some(policy.contains_label))?;
            for (ordinal, rel) in rels.iter().enumerate() {
                store.set_rel_attr(tx, rel.id, &address.to_string(), Value::Int(ordinal as i64))?;
                tagged += 1;
                stack.push((rel.dst, address.expand(ordinal as i64), depth + 1));
            }
        }

        Ok(tagged)
    })?;

    info!(context_id, tagged, "derived tree addresses for legacy subtree");
    Ok(true)
}
