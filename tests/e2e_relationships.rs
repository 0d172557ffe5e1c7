//! End-to-end tests for relationship objects: duplicate prevention,
//! combined type keys, atomic retargeting and bulk attribute copies.

use pretty_assertions::assert_eq;

use schemagraph::lifecycle::{bulk_copy_rel_attr, create_node};
use schemagraph::schema::{EntityType, GENERIC_NODE, GENERIC_REL};
use schemagraph::storage::in_tx;
use schemagraph::{
    keys, Error, GraphContext, GraphStore, MemoryIndex, MemoryStore, NodeId, PropertyMap,
    RelObject, SchemaRegistry, SearchIndex, UuidGenerator, Value,
};

const PAGE: EntityType = EntityType::new("Page");
const CONTENT: EntityType = EntityType::new("Content");

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
    registry.register_type(PAGE, Some(GENERIC_NODE));
    registry.register_type(CONTENT, Some(GENERIC_NODE));
    registry
}

fn make_node<'g>(
    cx: GraphContext<'g, MemoryStore>,
    entity_type: EntityType,
    name: &str,
) -> (NodeId, String) {
    let node = create_node(cx, entity_type, vec![(keys::NAME, Value::from(name))]).unwrap();
    (node.node_id().unwrap(), node.uuid().unwrap().unwrap())
}

fn props(pairs: &[(&str, Value)]) -> PropertyMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

// ============================================================================
// 1. Duplicate-relationship prevention
// ============================================================================

#[test]
fn test_duplicate_creation_yields_single_edge() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let (content, _) = make_node(cx, CONTENT, "content");

    let first = RelObject::create(cx, GENERIC_REL, page, content, "CONTAINS", PropertyMap::new())
        .unwrap();
    assert!(first.is_some());

    // identical start, end, label, attributes: no second edge, no error
    let second = RelObject::create(cx, GENERIC_REL, page, content, "CONTAINS", PropertyMap::new())
        .unwrap();
    assert!(second.is_none());
    assert_eq!(store.rel_count().unwrap(), 1);
}

#[test]
fn test_different_attributes_are_not_duplicates() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let (content, _) = make_node(cx, CONTENT, "content");

    RelObject::create(cx, GENERIC_REL, page, content, "CONTAINS", PropertyMap::new())
        .unwrap()
        .unwrap();
    let tagged = RelObject::create(
        cx,
        GENERIC_REL,
        page,
        content,
        "CONTAINS",
        props(&[("componentId", Value::from("comp-1"))]),
    )
    .unwrap();
    assert!(tagged.is_some());
    assert_eq!(store.rel_count().unwrap(), 2);
}

#[test]
fn test_context_attributes_do_not_distinguish_edges() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, ctx) = make_node(cx, PAGE, "page");
    let (content, _) = make_node(cx, CONTENT, "content");

    RelObject::create(
        cx,
        GENERIC_REL,
        page,
        content,
        "CONTAINS",
        props(&[(ctx.as_str(), Value::Int(0))]),
    )
    .unwrap()
    .unwrap();

    // only the context position differs: still the same logical edge
    let duplicate = RelObject::create(
        cx,
        GENERIC_REL,
        page,
        content,
        "CONTAINS",
        props(&[(ctx.as_str(), Value::Int(7))]),
    )
    .unwrap();
    assert!(duplicate.is_none());
    assert_eq!(store.rel_count().unwrap(), 1);
}

// ============================================================================
// 2. Creation bookkeeping
// ============================================================================

#[test]
fn test_creation_assigns_uuid_and_combined_type() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let (content, _) = make_node(cx, CONTENT, "content");

    let rel = RelObject::create(cx, GENERIC_REL, page, content, "CONTAINS", PropertyMap::new())
        .unwrap()
        .unwrap();

    assert_eq!(rel.uuid().unwrap().map(|u| u.len()), Some(32));
    assert_eq!(
        rel.get_attr("combinedType").unwrap(),
        Some(Value::from("Page/CONTAINS/Content"))
    );
}

// ============================================================================
// 3. Scalar attributes on relationships
// ============================================================================

#[test]
fn test_relationship_scalar_set_and_get() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let (content, _) = make_node(cx, CONTENT, "content");
    let mut rel = RelObject::create(cx, GENERIC_REL, page, content, "CONTAINS", PropertyMap::new())
        .unwrap()
        .unwrap();

    rel.set(keys::NAME, Value::from("slot-1")).unwrap();
    assert_eq!(rel.get(keys::NAME).unwrap(), Some(Value::from("slot-1")));

    // uuid is read-only on relationships too
    let denied = rel.set(keys::UUID, Value::from("forged"));
    assert!(matches!(denied, Err(Error::ReadOnlyViolation("uuid"))));
}

// ============================================================================
// 4. Retargeting
// ============================================================================

#[test]
fn test_retarget_end_preserves_identity_and_attributes() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let (old_target, _) = make_node(cx, CONTENT, "old");
    let (_, new_uuid) = make_node(cx, CONTENT, "new");

    let mut rel = RelObject::create(
        cx,
        GENERIC_REL,
        page,
        old_target,
        "CONTAINS",
        props(&[("componentId", Value::from("comp-1"))]),
    )
    .unwrap()
    .unwrap();
    let logical_uuid = rel.uuid().unwrap().unwrap();
    let old_store_id = rel.rel_id();

    rel.retarget_end(&new_uuid).unwrap();

    // one edge in the store, new endpoint, stable logical identifier
    assert_eq!(store.rel_count().unwrap(), 1);
    assert!(store.rel(old_store_id).unwrap().is_none());
    let record = store.rel(rel.rel_id()).unwrap().unwrap();
    assert_eq!(record.uuid(), Some(logical_uuid.as_str()));
    assert_eq!(record.get("componentId"), Some(&Value::from("comp-1")));
    assert_eq!(
        index.node_by_uuid(&new_uuid).unwrap().unwrap().id,
        record.dst
    );
}

#[test]
fn test_retarget_to_missing_endpoint_leaves_edge_untouched() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let (content, _) = make_node(cx, CONTENT, "content");
    let mut rel = RelObject::create(cx, GENERIC_REL, page, content, "CONTAINS", PropertyMap::new())
        .unwrap()
        .unwrap();
    let before = store.rel(rel.rel_id()).unwrap().unwrap();

    let result = rel.retarget_end("00000000000000000000000000000000");
    assert!(matches!(result, Err(Error::ReferenceNotFound(_))));

    // no partial state: the original edge is exactly as it was
    let after = store.rel(rel.rel_id()).unwrap().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_retarget_start_moves_source() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let (other_page, other_uuid) = make_node(cx, PAGE, "other");
    let (content, _) = make_node(cx, CONTENT, "content");

    let mut rel = RelObject::create(cx, GENERIC_REL, page, content, "CONTAINS", PropertyMap::new())
        .unwrap()
        .unwrap();
    rel.retarget_start(&other_uuid).unwrap();

    let record = store.rel(rel.rel_id()).unwrap().unwrap();
    assert_eq!(record.src, other_page);
    assert_eq!(record.dst, content);
}

#[test]
fn test_relabel_preserves_endpoints_and_attributes() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let (content, _) = make_node(cx, CONTENT, "content");
    let mut rel = RelObject::create(
        cx,
        GENERIC_REL,
        page,
        content,
        "CONTAINS",
        props(&[("componentId", Value::from("comp-1"))]),
    )
    .unwrap()
    .unwrap();
    let logical_uuid = rel.uuid().unwrap().unwrap();

    rel.relabel("OWNS").unwrap();

    let record = store.rel(rel.rel_id()).unwrap().unwrap();
    assert_eq!(record.label, "OWNS");
    assert_eq!(record.src, page);
    assert_eq!(record.dst, content);
    assert_eq!(record.uuid(), Some(logical_uuid.as_str()));
    assert_eq!(record.get("componentId"), Some(&Value::from("comp-1")));
    assert_eq!(
        record.get("combinedType"),
        Some(&Value::from("Page/OWNS/Content"))
    );
}

// ============================================================================
// 5. Deletion
// ============================================================================

#[test]
fn test_delete_removes_edge() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let (content, _) = make_node(cx, CONTENT, "content");
    let rel = RelObject::create(cx, GENERIC_REL, page, content, "CONTAINS", PropertyMap::new())
        .unwrap()
        .unwrap();

    assert!(rel.delete().unwrap());
    assert_eq!(store.rel_count().unwrap(), 0);
}

// ============================================================================
// 6. Bulk attribute copy
// ============================================================================

#[test]
fn test_bulk_copy_rel_attr() {
    let store = MemoryStore::new();
    let registry = registry();
    graph_context!(store, registry, index, cx);

    let (page, _) = make_node(cx, PAGE, "page");
    let mut rel_ids = Vec::new();
    for i in 0..8 {
        let (content, _) = make_node(cx, CONTENT, &format!("content-{i}"));
        let rel = RelObject::create(
            cx,
            GENERIC_REL,
            page,
            content,
            "CONTAINS",
            props(&[("sourceKey", Value::Int(i))]),
        )
        .unwrap()
        .unwrap();
        rel_ids.push(rel.rel_id());
    }

    // one foreign edge without a uuid: not managed by this core, skipped
    let (stray, _) = make_node(cx, CONTENT, "stray");
    let foreign = in_tx(&store, |tx| {
        store.create_rel(tx, page, stray, "CONTAINS", props(&[("sourceKey", Value::Int(99))]))
    })
    .unwrap();

    let copied = bulk_copy_rel_attr(&store, "CONTAINS", "sourceKey", "destKey").unwrap();
    assert_eq!(copied, 8);

    for (i, rel_id) in rel_ids.iter().enumerate() {
        let record = store.rel(*rel_id).unwrap().unwrap();
        assert_eq!(record.get("destKey"), Some(&Value::Int(i as i64)));
    }
    let foreign_record = store.rel(foreign).unwrap().unwrap();
    assert_eq!(foreign_record.get("destKey"), None);

    // idempotent re-run
    let again = bulk_copy_rel_attr(&store, "CONTAINS", "sourceKey", "destKey").unwrap();
    assert_eq!(again, 8);
}
