//! Node objects: the property-resolution engine for nodes.

use std::cell::{Cell, RefCell};

use chrono::Utc;
use hashbrown::HashMap;
use tracing::debug;

use crate::model::{NodeId, Value};
use crate::schema::keys::{self, PropKey};
use crate::schema::relation::RelationDecl;
use crate::schema::{EntityType, View};
use crate::storage::{in_tx, GraphStore};
use crate::{Error, Result};

use super::{
    convert_for_getter, convert_for_setter, convert_for_sorting, non_null,
    read_only_guard, CacheEntry, GraphContext, GraphObject,
};

// ============================================================================
// NodeObject
// ============================================================================

/// A node with the full attribute contract: stored scalars, converters,
/// schema defaults, property groups and edge-backed virtual properties.
///
/// Constructed either attached to a backing-store identity or detached
/// with a pending attribute map; identity is immutable once attached.
pub struct NodeObject<'g, S: GraphStore> {
    cx: GraphContext<'g, S>,
    entity_type: EntityType,
    state: State,
    cache: RefCell<HashMap<PropKey, CacheEntry>>,
    read_only_unlocked: Cell<bool>,
}

enum State {
    /// Not yet committed: attribute writes land in the pending map.
    Detached { pending: HashMap<PropKey, Value> },
    Attached { id: NodeId },
}

impl<'g, S: GraphStore> NodeObject<'g, S> {
    /// Wrap an existing backing-store node.
    pub fn attached(cx: GraphContext<'g, S>, entity_type: EntityType, id: NodeId) -> Self {
        Self {
            cx,
            entity_type,
            state: State::Attached { id },
            cache: RefCell::new(HashMap::new()),
            read_only_unlocked: Cell::new(false),
        }
    }

    /// A fresh, uncommitted node. Attribute writes accumulate in memory
    /// until the node goes through the creation lifecycle.
    pub fn detached(cx: GraphContext<'g, S>, entity_type: EntityType) -> Self {
        Self {
            cx,
            entity_type,
            state: State::Detached { pending: HashMap::new() },
            cache: RefCell::new(HashMap::new()),
            read_only_unlocked: Cell::new(false),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Backing-store identity, once attached.
    pub fn node_id(&self) -> Option<NodeId> {
        match &self.state {
            State::Attached { id } => Some(*id),
            State::Detached { .. } => None,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.state, State::Attached { .. })
    }

    pub fn uuid(&self) -> Result<Option<String>> {
        Ok(self
            .get(keys::core::UUID)?
            .and_then(|v| v.as_str().map(str::to_owned)))
    }

    pub fn display_name(&self) -> Result<Option<String>> {
        Ok(self
            .get(keys::core::NAME)?
            .and_then(|v| v.as_str().map(str::to_owned)))
    }

    /// The declared attribute keys of this node's type for a view.
    pub fn property_keys(&self, view: View) -> Vec<PropKey> {
        self.cx.registry.property_set(self.entity_type, view)
    }

    /// Permit exactly one following write to a read-only or write-once
    /// attribute. The permit is consumed by the next gated write attempt.
    pub fn unlock_read_only_properties_once(&self) {
        self.read_only_unlocked.set(true);
    }

    /// The pending attribute map of a detached node.
    pub(crate) fn take_pending(&mut self) -> HashMap<PropKey, Value> {
        match &mut self.state {
            State::Detached { pending } => std::mem::take(pending),
            State::Attached { .. } => HashMap::new(),
        }
    }

    /// Bind a detached node to its committed identity.
    pub(crate) fn attach(&mut self, id: NodeId) {
        self.state = State::Attached { id };
        self.cache.borrow_mut().clear();
    }

    // ========================================================================
    // get
    // ========================================================================

    /// Resolve an attribute value.
    ///
    /// Resolution order: pending map while detached; property group;
    /// relation adapter (never cached); stored raw value through the
    /// getter conversion (cached as `{raw, converted}`); schema default
    /// (never cached — it is not a true stored value). Unknown keys
    /// resolve to `None`.
    pub fn get(&self, key: PropKey) -> Result<Option<Value>> {
        let id = match &self.state {
            State::Detached { pending } => return Ok(pending.get(&key).cloned()),
            State::Attached { id } => *id,
        };

        let registry = self.cx.registry;
        let t = self.entity_type;

        if let Some(group) = registry.property_group(t, key) {
            let store = self.cx.store;
            return group
                .grouped(&mut |name| store.node_attr(id, name))
                .map(Some);
        }

        if let Some(entry) = self.cache.borrow().get(&key) {
            if let Some(converted) = &entry.converted {
                return Ok(Some(converted.clone()));
            }
        }

        if let Some(decl) = registry.relation(t, key) {
            return self.resolve_relation(&decl, id);
        }

        if let Some(raw) = self.cx.store.node_attr(id, key.name())? {
            let converted = convert_for_getter(registry, t, key, raw.clone())?;
            self.cache.borrow_mut().insert(
                key,
                CacheEntry { raw: Some(raw), converted: Some(converted.clone()) },
            );
            return Ok(non_null(Some(converted)));
        }

        Ok(registry.default_value(t, key))
    }

    /// Edge-backed resolution: collections materialize on every call,
    /// single targets adapt through the notion. Neither is cached.
    fn resolve_relation(&self, decl: &RelationDecl, id: NodeId) -> Result<Option<Value>> {
        if decl.cardinality.is_collection() {
            let records = decl.related_records(self.cx.store, id)?;
            let items = records
                .iter()
                .map(|r| decl.notion.adapt_for_getter(r))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Some(Value::List(items)));
        }
        match decl.related_record(self.cx.store, id)? {
            Some(record) => Ok(non_null(Some(decl.notion.adapt_for_getter(&record)?))),
            None => Ok(self.cx.registry.default_value(self.entity_type, decl.key)),
        }
    }

    /// Raw stored value, bypassing getter conversion (and the relation /
    /// default fallbacks).
    pub fn get_raw(&self, key: PropKey) -> Result<Option<Value>> {
        match &self.state {
            State::Detached { pending } => Ok(pending.get(&key).cloned()),
            State::Attached { id } => {
                if let Some(entry) = self.cache.borrow().get(&key) {
                    if let Some(raw) = &entry.raw {
                        return Ok(Some(raw.clone()));
                    }
                }
                let raw = self.cx.store.node_attr(*id, key.name())?;
                if let Some(raw) = &raw {
                    self.cache.borrow_mut().entry(key).or_default().raw = Some(raw.clone());
                }
                Ok(raw)
            }
        }
    }

    /// Raw stored value passed through the sort conversion; used when
    /// ordering objects by a converted attribute.
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

    // ========================================================================
    // set
    // ========================================================================

    /// Write an attribute. `Value::Null` removes the stored value.
    ///
    /// Read-only and write-once keys fail with `ReadOnlyViolation` unless
    /// a one-shot unlock preceded the write. Edge-backed keys translate
    /// to relationship create/remove. Scalar writes convert for storage,
    /// no-op when unchanged, and otherwise commit inside one transaction,
    /// stamping the last-modified timestamp.
    pub fn set(&mut self, key: PropKey, value: Value) -> Result<()> {
        let registry = self.cx.registry;
        let t = self.entity_type;

        if let Some(group) = registry.property_group(t, key) {
            self.guard_write(key)?;
            let id = self.require_attached()?;
            let store = self.cx.store;
            in_tx(store, |tx| {
                group.set_grouped(&value, &mut |name, v| match v {
                    Some(v) => store.set_node_attr(tx, id, name, v),
                    None => store.remove_node_attr(tx, id, name),
                })
            })?;
            self.invalidate(key);
            return Ok(());
        }

        if let Some(decl) = registry.relation(t, key) {
            self.guard_write(key)?;
            let result = self.set_related(&decl, value);
            self.invalidate(key);
            return result;
        }

        if let State::Detached { .. } = self.state {
            self.guard_write(key)?;
            if key == keys::core::LAST_MODIFIED_DATE {
                debug!(entity_type = t.name(), "dropped direct write to lastModifiedDate");
                return Ok(());
            }
            let converted = non_null(Some(convert_for_setter(registry, t, key, value)?));
            if let State::Detached { pending } = &mut self.state {
                match converted {
                    Some(v) => pending.insert(key, v),
                    None => pending.remove(&key),
                };
            }
            self.invalidate(key);
            return Ok(());
        }

        let store = self.cx.store;
        in_tx(store, |tx| self.apply_scalar_in_tx(tx, key, value.clone()))
    }

    /// The scalar write path inside a caller-provided transaction, used
    /// by `set` and by the modify lifecycle which groups several writes
    /// and their validation into one transaction.
    pub(crate) fn apply_scalar_in_tx(
        &self,
        tx: &mut S::Tx,
        key: PropKey,
        value: Value,
    ) -> Result<()> {
        let registry = self.cx.registry;
        let t = self.entity_type;
        let id = self.require_attached()?;
        let store = self.cx.store;

        self.guard_write(key)?;

        // Setting the audit timestamp explicitly is not allowed.
        if key == keys::core::LAST_MODIFIED_DATE {
            debug!(entity_type = t.name(), "dropped direct write to lastModifiedDate");
            return Ok(());
        }

        let converted = convert_for_setter(registry, t, key, value)?;
        let new_value = non_null(Some(converted));
        let old_value = non_null(store.node_attr(id, key.name())?);

        if new_value == old_value {
            debug!(key = key.name(), "write is a no-op");
            return Ok(());
        }

        match &new_value {
            Some(v) => {
                store.set_node_attr(tx, id, key.name(), v.clone())?;
                store.set_node_attr(
                    tx,
                    id,
                    keys::core::LAST_MODIFIED_DATE.name(),
                    Value::Int(Utc::now().timestamp_millis()),
                )?;
            }
            None => store.remove_node_attr(tx, id, key.name())?,
        }

        self.invalidate(key);
        Ok(())
    }

    /// Mutate the edges backing a relation-declared key: absent/empty
    /// input removes the edges, non-empty input resolves each element
    /// through the notion and creates the edge(s).
    fn set_related(&mut self, decl: &RelationDecl, value: Value) -> Result<()> {
        let id = self.require_attached()?;
        let store = self.cx.store;

        if value.is_empty() {
            let targets = decl.related_records(store, id)?;
            if targets.is_empty() {
                return Ok(());
            }
            return in_tx(store, |tx| {
                for target in &targets {
                    decl.remove_relationship(store, tx, id, target.id)?;
                }
                Ok(())
            });
        }

        let inputs: Vec<Value> = match value {
            Value::List(items) => items,
            single => vec![single],
        };

        let mut targets = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let (attr, needle) = decl.notion.adapt_for_setter(input)?;
            let record = self
                .cx
                .index
                .find_nodes(None, &attr, &needle)?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    Error::ReferenceNotFound(format!("{attr} = {needle} for key '{}'", decl.key))
                })?;
            targets.push(record.id);
        }

        in_tx(store, |tx| {
            for target in targets {
                decl.create_relationship(store, tx, id, target)?;
            }
            Ok(())
        })
    }

    fn guard_write(&self, key: PropKey) -> Result<()> {
        let has_stored = match &self.state {
            State::Attached { id } => self.cx.store.node_attr(*id, key.name())?.is_some(),
            State::Detached { pending } => pending.contains_key(&key),
        };
        read_only_guard(
            self.cx.registry,
            self.entity_type,
            key,
            has_stored,
            &self.read_only_unlocked,
        )
    }

    fn require_attached(&self) -> Result<NodeId> {
        self.node_id()
            .ok_or_else(|| Error::Tx("operation requires a committed node".into()))
    }

    fn invalidate(&self, key: PropKey) {
        self.cache.borrow_mut().remove(&key);
    }
}

// ============================================================================
// Equality / uniform surface
// ============================================================================

impl<'g, S: GraphStore> std::fmt::Debug for NodeObject<'g, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeObject")
            .field("entity_type", &self.entity_type.name())
            .field("node_id", &self.node_id())
            .finish()
    }
}

/// Two attached nodes are equal iff their backing identities are equal.
impl<'g, S: GraphStore> PartialEq for NodeObject<'g, S> {
    fn eq(&self, other: &Self) -> bool {
        match (self.node_id(), other.node_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<'g, S: GraphStore> GraphObject for NodeObject<'g, S> {
    fn graph_type(&self) -> &str {
        self.entity_type.name()
    }

    fn get_value(&self, key: PropKey) -> Result<Option<Value>> {
        self.get(key)
    }
}
