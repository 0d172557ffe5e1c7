//! Relationship objects: scalar attribute engine, duplicate-free creation
//! and atomic retargeting.

use std::cell::{Cell, RefCell};

use chrono::Utc;
use hashbrown::HashMap;
use tracing::debug;

use crate::model::{NodeId, PropertyMap, RelId, Value};
use crate::schema::keys::{self, PropKey};
use crate::schema::EntityType;
use crate::storage::{in_tx, GraphStore};
use crate::tree::address::is_context_key;
use crate::{Error, Result};

use super::{
    convert_for_getter, convert_for_setter, convert_for_sorting, non_null,
    read_only_guard, CacheEntry, GraphContext, GraphObject,
};

/// Attributes managed by the core itself, excluded from duplicate
/// comparison.
const AUTO_KEYS: [&str; 4] = [
    "uuid",
    "createdDate",
    "lastModifiedDate",
    "combinedType",
];

// ============================================================================
// RelObject
// ============================================================================

/// A relationship with cached endpoints, the scalar attribute contract,
/// and — uniquely — context position attributes managed by the tree
/// encoder as plain storage-level attributes.
pub struct RelObject<'g, S: GraphStore> {
    cx: GraphContext<'g, S>,
    entity_type: EntityType,
    id: RelId,
    src: NodeId,
    dst: NodeId,
    label: String,
    cache: RefCell<HashMap<PropKey, CacheEntry>>,
    read_only_unlocked: Cell<bool>,
}

impl<'g, S: GraphStore> RelObject<'g, S> {
    /// Wrap an existing backing-store relationship.
    pub fn attached(cx: GraphContext<'g, S>, entity_type: EntityType, id: RelId) -> Result<Self> {
        let record = cx
            .store
            .rel(id)?
            .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
        Ok(Self {
            cx,
            entity_type,
            id,
            src: record.src,
            dst: record.dst,
            label: record.label,
            cache: RefCell::new(HashMap::new()),
            read_only_unlocked: Cell::new(false),
        })
    }

    /// Create a relationship unless an identical one already exists.
    ///
    /// "Identical" means same start node, end node and label with an
    /// equal set of non-context attributes; the check runs inside the
    /// creation transaction, not via an index constraint. Returns
    /// `Ok(None)` when a duplicate was found and nothing was created.
    pub fn create(
        cx: GraphContext<'g, S>,
        entity_type: EntityType,
        src: NodeId,
        dst: NodeId,
        label: &str,
        props: PropertyMap,
    ) -> Result<Option<Self>> {
        let store = cx.store;
        let candidate = significant_attrs(&props);

        let created = in_tx(store, |tx| {
            for existing in store.rels_of(src, crate::model::Direction::Outgoing, Some(label))? {
                if existing.dst == dst && significant_attrs(&existing.properties) == candidate {
                    debug!(label, "duplicate relationship, nothing created");
                    return Ok(None);
                }
            }

            let mut props = props.clone();
            if props.get(keys::core::UUID.name()).is_none_or(Value::is_empty) {
                props.insert(keys::core::UUID.name().to_string(), Value::String(cx.ids.next_id()));
            }
            props.insert(
                keys::core::CREATED_DATE.name().to_string(),
                Value::Int(Utc::now().timestamp_millis()),
            );
            props.insert(
                keys::rel::COMBINED_TYPE.name().to_string(),
                Value::String(combined_type(store, src, dst, label)?),
            );

            store.create_rel(tx, src, dst, label, props).map(Some)
        })?;

        match created {
            Some(id) => Ok(Some(Self {
                cx,
                entity_type,
                id,
                src,
                dst,
                label: label.to_string(),
                cache: RefCell::new(HashMap::new()),
                read_only_unlocked: Cell::new(false),
            })),
            None => Ok(None),
        }
    }

    pub fn rel_id(&self) -> RelId {
        self.id
    }

    pub fn start_id(&self) -> NodeId {
        self.src
    }

    pub fn end_id(&self) -> NodeId {
        self.dst
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.src { Some(self.dst) }
        else if from == self.dst { Some(self.src) }
        else { None }
    }

    pub fn uuid(&self) -> Result<Option<String>> {
        Ok(self
            .get_attr(keys::core::UUID.name())?
            .and_then(|v| v.as_str().map(str::to_owned)))
    }

    /// Current attribute map from the store.
    pub fn properties(&self) -> Result<PropertyMap> {
        Ok(self
            .cx
            .store
            .rel(self.id)?
            .map(|r| r.properties)
            .unwrap_or_default())
    }

    /// Permit exactly one following write to a read-only attribute.
    pub fn unlock_read_only_properties_once(&self) {
        self.read_only_unlocked.set(true);
    }

    // ========================================================================
    // Typed attribute access
    // ========================================================================

    /// Resolve a declared attribute: cached converted value, stored raw
    /// value through the getter conversion, schema default.
    pub fn get(&self, key: PropKey) -> Result<Option<Value>> {
        if let Some(entry) = self.cache.borrow().get(&key) {
            if let Some(converted) = &entry.converted {
                return Ok(Some(converted.clone()));
            }
        }

        if let Some(raw) = self.cx.store.rel_attr(self.id, key.name())? {
            let converted = convert_for_getter(self.cx.registry, self.entity_type, key, raw.clone())?;
            self.cache.borrow_mut().insert(
                key,
                CacheEntry { raw: Some(raw), converted: Some(converted.clone()) },
            );
            return Ok(non_null(Some(converted)));
        }

        Ok(self.cx.registry.default_value(self.entity_type, key))
    }

    pub fn get_raw(&self, key: PropKey) -> Result<Option<Value>> {
        if let Some(entry) = self.cache.borrow().get(&key) {
            if let Some(raw) = &entry.raw {
                return Ok(Some(raw.clone()));
            }
        }
        let raw = self.cx.store.rel_attr(self.id, key.name())?;
        if let Some(raw) = &raw {
            self.cache.borrow_mut().entry(key).or_default().raw = Some(raw.clone());
        }
        Ok(raw)
    }

    pub fn comparable_value(&self, key: PropKey) -> Result<Option<Value>> {
        match self.get_raw(key)? {
            Some(raw) => Ok(non_null(Some(convert_for_sorting(
                self.cx.registry,
                self.entity_type,
                key,
                raw,
            )?))),
            None => Ok(None),
        }
    }

    /// Write a declared attribute. `Value::Null` removes it.
    pub fn set(&mut self, key: PropKey, value: Value) -> Result<()> {
        let registry = self.cx.registry;
        let t = self.entity_type;

        let has_stored = self.cx.store.rel_attr(self.id, key.name())?.is_some();
        read_only_guard(registry, t, key, has_stored, &self.read_only_unlocked)?;

        if key == keys::core::LAST_MODIFIED_DATE {
            debug!(entity_type = t.name(), "dropped direct write to lastModifiedDate");
            return Ok(());
        }

        let converted = convert_for_setter(registry, t, key, value)?;
        let new_value = non_null(Some(converted));
        let old_value = non_null(self.cx.store.rel_attr(self.id, key.name())?);
        if new_value == old_value {
            debug!(key = key.name(), "write is a no-op");
            return Ok(());
        }

        let store = self.cx.store;
        let id = self.id;
        in_tx(store, |tx| {
            match &new_value {
                Some(v) => {
                    store.set_rel_attr(tx, id, key.name(), v.clone())?;
                    store.set_rel_attr(
                        tx,
                        id,
                        keys::core::LAST_MODIFIED_DATE.name(),
                        Value::Int(Utc::now().timestamp_millis()),
                    )?;
                }
                None => store.remove_rel_attr(tx, id, key.name())?,
            }
            Ok(())
        })?;

        self.cache.borrow_mut().remove(&key);
        Ok(())
    }

    // ========================================================================
    // Dynamic (storage-level) attribute access
    // ========================================================================

    /// Raw attribute by runtime name — context position attributes and
    /// other storage-level entries the schema does not declare.
    pub fn get_attr(&self, key: &str) -> Result<Option<Value>> {
        self.cx.store.rel_attr(self.id, key)
    }

    pub fn set_attr(&self, key: &str, value: Value) -> Result<()> {
        let store = self.cx.store;
        let id = self.id;
        in_tx(store, |tx| store.set_rel_attr(tx, id, key, value.clone()))
    }

    pub fn remove_attr(&self, key: &str) -> Result<()> {
        let store = self.cx.store;
        let id = self.id;
        in_tx(store, |tx| store.remove_rel_attr(tx, id, key))
    }

    // ========================================================================
    // Retargeting
    // ========================================================================

    /// Point the relationship at a new start node, atomically.
    ///
    /// The storage-level edge is deleted and recreated inside one
    /// transaction with all non-structural attributes preserved, so the
    /// stable uuid — the logical identifier — carries over. An
    /// unresolvable uuid fails with `ReferenceNotFound` and leaves the
    /// original edge untouched.
    pub fn retarget_start(&mut self, new_start_uuid: &str) -> Result<()> {
        let current = self.endpoint_uuid(self.src)?;
        if current.as_deref() == Some(new_start_uuid) {
            return Ok(());
        }
        let new_start = self.resolve_endpoint(new_start_uuid)?;
        self.recreate(new_start, self.dst, None)
    }

    /// Point the relationship at a new end node, atomically.
    pub fn retarget_end(&mut self, new_end_uuid: &str) -> Result<()> {
        let current = self.endpoint_uuid(self.dst)?;
        if current.as_deref() == Some(new_end_uuid) {
            return Ok(());
        }
        let new_end = self.resolve_endpoint(new_end_uuid)?;
        self.recreate(self.src, new_end, None)
    }

    /// Change the label, atomically, preserving endpoints and attributes.
    pub fn relabel(&mut self, new_label: &str) -> Result<()> {
        if self.label == new_label {
            return Ok(());
        }
        self.recreate(self.src, self.dst, Some(new_label.to_string()))
    }

    /// Delete the backing edge.
    pub fn delete(self) -> Result<bool> {
        let store = self.cx.store;
        let id = self.id;
        in_tx(store, |tx| store.delete_rel(tx, id))
    }

    fn endpoint_uuid(&self, node: NodeId) -> Result<Option<String>> {
        Ok(self
            .cx
            .store
            .node(node)?
            .and_then(|r| r.uuid().map(str::to_owned)))
    }

    fn resolve_endpoint(&self, uuid: &str) -> Result<NodeId> {
        self.cx
            .index
            .node_by_uuid(uuid)?
            .map(|r| r.id)
            .ok_or_else(|| Error::ReferenceNotFound(uuid.to_string()))
    }

    fn recreate(&mut self, src: NodeId, dst: NodeId, label: Option<String>) -> Result<()> {
        let store = self.cx.store;
        let old_id = self.id;
        let label = label.unwrap_or_else(|| self.label.clone());

        let new_id = in_tx(store, |tx| {
            let record = store
                .rel(old_id)?
                .ok_or_else(|| Error::NotFound(format!("Relationship {old_id}")))?;
            let mut props = record.properties;
            props.insert(
                keys::rel::COMBINED_TYPE.name().to_string(),
                Value::String(combined_type(store, src, dst, &label)?),
            );
            store.delete_rel(tx, old_id)?;
            store.create_rel(tx, src, dst, &label, props)
        })?;

        self.id = new_id;
        self.src = src;
        self.dst = dst;
        self.label = label;
        self.cache.borrow_mut().clear();
        Ok(())
    }
}

// ============================================================================
// Equality / uniform surface
// ============================================================================

impl<'g, S: GraphStore> PartialEq for RelObject<'g, S> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<'g, S: GraphStore> GraphObject for RelObject<'g, S> {
    fn graph_type(&self) -> &str {
        self.entity_type.name()
    }

    fn get_value(&self, key: PropKey) -> Result<Option<Value>> {
        self.get(key)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// The attributes that make two edges "the same": everything except
/// context position entries and core-managed bookkeeping.
fn significant_attrs(props: &PropertyMap) -> Vec<(&str, &Value)> {
    let mut attrs: Vec<(&str, &Value)> = props
        .iter()
        .filter(|(k, _)| !is_context_key(k) && !AUTO_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.as_str(), v))
        .collect();
    attrs.sort_by_key(|(k, _)| *k);
    attrs
}

/// `<startType>/<label>/<endType>` — the combined type key for fast
/// type-scoped edge lookup.
fn combined_type<S: GraphStore>(
    store: &S,
    src: NodeId,
    dst: NodeId,
    label: &str,
) -> Result<String> {
    let type_of = |id: NodeId| -> Result<String> {
        Ok(store
            .node(id)?
            .and_then(|r| r.type_name().map(str::to_owned))
            .unwrap_or_else(|| "GenericNode".to_string()))
    };
    Ok(format!("{}/{}/{}", type_of(src)?, label, type_of(dst)?))
}
