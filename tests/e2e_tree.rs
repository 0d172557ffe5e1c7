//! End-to-end tests for the tree position encoder: per-context child
//! ordering, re-addressing, membership removal and legacy migration.

use pretty_assertions::assert_eq;

use schemagraph::lifecycle::create_node;
use schemagraph::schema::{EntityType, GENERIC_NODE, GENERIC_REL};
use schemagraph::storage::in_tx;
use schemagraph::tree::{
    attach_child, child_nodes, contexts_of, derive_addresses, expand_address, next_position,
    remove_from_context, reorder_children, resolve_position, retag_subtree, TreeAddress,
    TreePolicy,
};
use schemagraph::{
    keys, Error, GraphContext, GraphStore, MemoryIndex, MemoryStore, NodeId, PropKey,
    RelObject, SchemaRegistry, UuidGenerator, Value,
};

const CONTENT: EntityType = EntityType::new("Content");
const COMPONENT: EntityType = EntityType::new("Component");

macro_rules! graph_context {
    ($store:ident, $registry:ident, $index:ident, $cx:ident) => {
        let $index = MemoryIndex::new($store.clone());
        let $cx: GraphContext<'_, MemoryStore> = GraphContext {
            store: &$store,
            registry: &$registry,
            index: &$index,
            ids: &UuidGenerator,
        };
    };
}

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::with_core_types();
    registry.register_type(CONTENT, Some(GENERIC_NODE));
    registry.register_type(COMPONENT, Some(GENERIC_NODE));
    registry
}

/// A node created through the lifecycle; returns (id, uuid).
fn make_node<'g>(
    cx: GraphContext<'g, MemoryStore>,
    entity_type: EntityType,
    name: &str,
) -> (NodeId, String) {
    let node = create_node(cx, entity_type, vec![(keys::NAME, Value::from(name))]).unwrap();
    (node.node_id().unwrap(), node.uuid().unwrap().unwrap())
}

// ============================================================================
// 1. Per-context child ordering
// ============================================================================

#[test]
fn test_children_ordered_per_context() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (page_a, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (page_b, ctx_b) = make_node(cx, GENERIC_NODE, "page-b");
    let (parent, _) = make_node(cx, GENERIC_NODE, "shared");
    let (first, _) = make_node(cx, CONTENT, "first");
    let (second, _) = make_node(cx, CONTENT, "second");
    let _ = (page_a, page_b);

    attach_child(cx, parent, first, &ctx_a, &policy).unwrap();
    attach_child(cx, parent, second, &ctx_a, &policy).unwrap();

    let under_a = child_nodes(&store, parent, Some(ctx_a.as_str()), None, &policy).unwrap();
    assert_eq!(
        under_a.iter().map(|n| n.get_str("name").unwrap()).collect::<Vec<_>>(),
        vec!["first", "second"]
    );

    // an unrelated context sees no children at all
    let under_b = child_nodes(&store, parent, Some(ctx_b.as_str()), None, &policy).unwrap();
    assert!(under_b.is_empty());
}

#[test]
fn test_same_edges_carry_independent_orderings() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (_, ctx_b) = make_node(cx, GENERIC_NODE, "page-b");
    let (parent, _) = make_node(cx, GENERIC_NODE, "shared");
    let (x, _) = make_node(cx, CONTENT, "x");
    let (y, _) = make_node(cx, CONTENT, "y");

    // context A orders [x, y]; context B orders [y, x] — on the same edges
    let rel_x = attach_child(cx, parent, x, &ctx_a, &policy).unwrap().unwrap();
    let rel_y = attach_child(cx, parent, y, &ctx_a, &policy).unwrap().unwrap();
    in_tx(&store, |tx| {
        store.set_rel_attr(tx, rel_x, &ctx_b, Value::Int(1))?;
        store.set_rel_attr(tx, rel_y, &ctx_b, Value::Int(0))
    })
    .unwrap();

    let names = |ctx: &str| {
        child_nodes(&store, parent, Some(ctx), None, &policy)
            .unwrap()
            .iter()
            .map(|n| n.get_str("name").unwrap().to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&ctx_a), vec!["x", "y"]);
    assert_eq!(names(&ctx_b), vec!["y", "x"]);
}

// ============================================================================
// 2. Position lookup: wildcard, string normalization, misuse
// ============================================================================

#[test]
fn test_wildcard_position_applies_to_any_context() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (child, _) = make_node(cx, CONTENT, "child");

    let rel = RelObject::create(cx, GENERIC_REL, parent, child, "CONTAINS", {
        let mut props = schemagraph::PropertyMap::new();
        props.insert("*".into(), Value::Int(5));
        props
    })
    .unwrap()
    .unwrap();

    let record = store.rel(rel.rel_id()).unwrap().unwrap();
    assert_eq!(resolve_position(&record, &ctx_a).unwrap(), Some(5));

    // and the child shows up under a context the edge never named
    let children = child_nodes(&store, parent, Some(ctx_a.as_str()), None, &policy).unwrap();
    assert_eq!(children.len(), 1);
}

#[test]
fn test_exact_position_wins_over_wildcard() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (child, _) = make_node(cx, CONTENT, "child");

    let rel = RelObject::create(cx, GENERIC_REL, parent, child, "CONTAINS", {
        let mut props = schemagraph::PropertyMap::new();
        props.insert("*".into(), Value::Int(9));
        props.insert(ctx_a.clone(), Value::Int(2));
        props
    })
    .unwrap()
    .unwrap();

    let record = store.rel(rel.rel_id()).unwrap().unwrap();
    assert_eq!(resolve_position(&record, &ctx_a).unwrap(), Some(2));
}

#[test]
fn test_numeric_string_position_is_normalized() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (child, _) = make_node(cx, CONTENT, "child");

    let rel = RelObject::create(cx, GENERIC_REL, parent, child, "CONTAINS", {
        let mut props = schemagraph::PropertyMap::new();
        props.insert(ctx_a.clone(), Value::from("17"));
        props
    })
    .unwrap()
    .unwrap();

    let record = store.rel(rel.rel_id()).unwrap().unwrap();
    assert_eq!(resolve_position(&record, &ctx_a).unwrap(), Some(17));
}

#[test]
fn test_malformed_position_is_fatal() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (child, _) = make_node(cx, CONTENT, "child");

    let rel = RelObject::create(cx, GENERIC_REL, parent, child, "CONTAINS", {
        let mut props = schemagraph::PropertyMap::new();
        props.insert(ctx_a.clone(), Value::Bool(true));
        props
    })
    .unwrap()
    .unwrap();

    let record = store.rel(rel.rel_id()).unwrap().unwrap();
    assert!(matches!(
        resolve_position(&record, &ctx_a),
        Err(Error::MalformedPosition { .. })
    ));
}

// ============================================================================
// 3. Appending and renumbering
// ============================================================================

#[test]
fn test_next_position_appends_after_existing_children() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (a, _) = make_node(cx, CONTENT, "a");
    let (b, _) = make_node(cx, CONTENT, "b");

    attach_child(cx, parent, a, &ctx_a, &policy).unwrap();
    attach_child(cx, parent, b, &ctx_a, &policy).unwrap();
    assert_eq!(next_position(&store, parent, &ctx_a, 0, &policy).unwrap(), 2);
    // a caller-provided floor wins when higher
    assert_eq!(next_position(&store, parent, &ctx_a, 10, &policy).unwrap(), 10);
}

#[test]
fn test_reorder_children_renumbers_gap_free() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (a, _) = make_node(cx, CONTENT, "a");
    let (b, _) = make_node(cx, CONTENT, "b");

    let rel_a = attach_child(cx, parent, a, &ctx_a, &policy).unwrap().unwrap();
    let rel_b = attach_child(cx, parent, b, &ctx_a, &policy).unwrap().unwrap();
    in_tx(&store, |tx| {
        store.set_rel_attr(tx, rel_a, &ctx_a, Value::Int(4))?;
        store.set_rel_attr(tx, rel_b, &ctx_a, Value::Int(9))
    })
    .unwrap();

    reorder_children(&store, parent, &ctx_a, &policy).unwrap();

    let record_a = store.rel(rel_a).unwrap().unwrap();
    let record_b = store.rel(rel_b).unwrap().unwrap();
    assert_eq!(resolve_position(&record_a, &ctx_a).unwrap(), Some(0));
    assert_eq!(resolve_position(&record_b, &ctx_a).unwrap(), Some(1));
}

// ============================================================================
// 4. Tree addresses
// ============================================================================

#[test]
fn test_expand_address_descends_one_level() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (child, _) = make_node(cx, CONTENT, "child");

    let rel_id = attach_child(cx, parent, child, &ctx_a, &policy).unwrap().unwrap();
    let record = store.rel(rel_id).unwrap().unwrap();

    let root: TreeAddress = ctx_a.parse().unwrap();
    let child_addr = expand_address(&record, &root).unwrap();
    assert_eq!(child_addr.to_string(), format!("{ctx_a}_0"));
    assert_eq!(child_addr.parent(), Some(root));
}

// ============================================================================
// 5. Re-addressing a shared subtree
// ============================================================================

#[test]
fn test_retag_subtree_copies_without_disturbing_source() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (_, ctx_b) = make_node(cx, GENERIC_NODE, "page-b");
    let (root, _) = make_node(cx, GENERIC_NODE, "fragment");
    let (mid, _) = make_node(cx, COMPONENT, "mid");
    let (leaf, _) = make_node(cx, CONTENT, "leaf");

    // level 1 keyed by the context id, level 2 by the child address
    let rel_top = attach_child(cx, root, mid, &ctx_a, &policy).unwrap().unwrap();
    let level2 = format!("{ctx_a}_0");
    let rel_deep = attach_child(cx, mid, leaf, &level2, &policy).unwrap().unwrap();

    let copied = retag_subtree(&store, root, &ctx_a, &ctx_b, &policy).unwrap();
    assert_eq!(copied, 2);

    // A's attributes intact, equivalent B attributes added at every edge
    let top = store.rel(rel_top).unwrap().unwrap();
    assert_eq!(top.get(&ctx_a), Some(&Value::Int(0)));
    assert_eq!(top.get(&ctx_b), Some(&Value::Int(0)));

    let deep = store.rel(rel_deep).unwrap().unwrap();
    assert_eq!(deep.get(&level2), Some(&Value::Int(0)));
    assert_eq!(deep.get(&format!("{ctx_b}_0")), Some(&Value::Int(0)));
}

#[test]
fn test_retag_subtree_survives_cycles() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (_, ctx_b) = make_node(cx, GENERIC_NODE, "page-b");
    let (a, _) = make_node(cx, GENERIC_NODE, "a");
    let (b, _) = make_node(cx, GENERIC_NODE, "b");

    attach_child(cx, a, b, &ctx_a, &policy).unwrap();
    attach_child(cx, b, a, &ctx_a, &policy).unwrap();

    // terminates despite the containment cycle
    let copied = retag_subtree(&store, a, &ctx_a, &ctx_b, &policy).unwrap();
    assert_eq!(copied, 2);
}

// ============================================================================
// 6. Membership removal
// ============================================================================

#[test]
fn test_removing_sole_context_deletes_relationship() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (child, _) = make_node(cx, CONTENT, "child");

    let rel_id = attach_child(cx, parent, child, &ctx_a, &policy).unwrap().unwrap();

    let deleted = remove_from_context(&store, &index, rel_id, &ctx_a).unwrap();
    assert!(deleted);
    assert!(store.rel(rel_id).unwrap().is_none());
}

#[test]
fn test_removing_one_of_several_contexts_keeps_relationship() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (_, ctx_b) = make_node(cx, GENERIC_NODE, "page-b");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (child, _) = make_node(cx, CONTENT, "child");

    let rel_id = attach_child(cx, parent, child, &ctx_a, &policy).unwrap().unwrap();
    in_tx(&store, |tx| store.set_rel_attr(tx, rel_id, &ctx_b, Value::Int(3))).unwrap();

    let deleted = remove_from_context(&store, &index, rel_id, &ctx_a).unwrap();
    assert!(!deleted);

    let record = store.rel(rel_id).unwrap().unwrap();
    assert_eq!(record.get(&ctx_a), None);
    assert_eq!(record.get(&ctx_b), Some(&Value::Int(3)));
}

#[test]
fn test_contexts_of_lists_referencing_pages() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (_, ctx_b) = make_node(cx, GENERIC_NODE, "page-b");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (child, _) = make_node(cx, CONTENT, "child");

    let rel_id = attach_child(cx, parent, child, &ctx_a, &policy).unwrap().unwrap();
    in_tx(&store, |tx| store.set_rel_attr(tx, rel_id, &format!("{ctx_b}_1"), Value::Int(0)))
        .unwrap();

    let mut contexts = contexts_of(&store, child, &policy).unwrap();
    contexts.sort();
    let mut expected = vec![ctx_a, ctx_b];
    expected.sort();
    assert_eq!(contexts, expected);
}

// ============================================================================
// 7. Component filter
// ============================================================================

#[test]
fn test_component_filter_restricts_children() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (parent, _) = make_node(cx, GENERIC_NODE, "parent");
    let (literal, _) = make_node(cx, CONTENT, "literal");
    let (bound, _) = make_node(cx, CONTENT, "bound");
    let (tagged, _) = make_node(cx, COMPONENT, "tagged");

    // a data-bound content node carries the data-key marker
    let mut bound_obj = schemagraph::NodeObject::attached(cx, CONTENT, bound);
    bound_obj.set(PropKey::new("data-key"), Value::from("item")).unwrap();

    let rel_literal = attach_child(cx, parent, literal, &ctx_a, &policy).unwrap().unwrap();
    let rel_bound = attach_child(cx, parent, bound, &ctx_a, &policy).unwrap().unwrap();
    let rel_tagged = attach_child(cx, parent, tagged, &ctx_a, &policy).unwrap().unwrap();
    let _ = (rel_literal, rel_bound);
    in_tx(&store, |tx| {
        store.set_rel_attr(tx, rel_tagged, "componentId", Value::from("comp-1"))
    })
    .unwrap();

    let children = child_nodes(&store, parent, Some(ctx_a.as_str()), Some("comp-1"), &policy)
        .unwrap();
    let names: Vec<&str> = children.iter().map(|n| n.get_str("name").unwrap()).collect();

    // literal content passes, data-bound content does not, and the
    // component passes only through its matching tag
    assert_eq!(names, vec!["literal", "tagged"]);

    let other = child_nodes(&store, parent, Some(ctx_a.as_str()), Some("comp-2"), &policy)
        .unwrap();
    let other_names: Vec<&str> = other.iter().map(|n| n.get_str("name").unwrap()).collect();
    assert_eq!(other_names, vec!["literal"]);
}

// ============================================================================
// 8. Legacy migration
// ============================================================================

#[test]
fn test_derive_addresses_for_legacy_subtree() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);
    let policy = TreePolicy::default();

    let (_, ctx_a) = make_node(cx, GENERIC_NODE, "page-a");
    let (root, _) = make_node(cx, GENERIC_NODE, "root");
    let (mid, _) = make_node(cx, GENERIC_NODE, "mid");
    let (leaf, _) = make_node(cx, CONTENT, "leaf");

    // legacy data: containment edges with no context attributes at all
    let rel_top = in_tx(&store, |tx| {
        store.create_rel(tx, root, mid, "CONTAINS", schemagraph::PropertyMap::new())
    })
    .unwrap();
    let rel_deep = in_tx(&store, |tx| {
        store.create_rel(tx, mid, leaf, "CONTAINS", schemagraph::PropertyMap::new())
    })
    .unwrap();

    assert!(derive_addresses(&store, &ctx_a, root, &policy).unwrap());

    let top = store.rel(rel_top).unwrap().unwrap();
    assert_eq!(top.get(&ctx_a), Some(&Value::Int(0)));
    let deep = store.rel(rel_deep).unwrap().unwrap();
    assert_eq!(deep.get(&format!("{ctx_a}_0")), Some(&Value::Int(0)));

    // a second run is a no-op: the subtree is addressed now
    assert!(!derive_addresses(&store, &ctx_a, root, &policy).unwrap());
}
