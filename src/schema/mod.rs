//! # Schema Registry
//!
//! Process-wide, per-entity-type metadata: declared property sets per
//! view, converters, defaults, read-only/write-once flags, relation
//! declarations, property groups, validators, and ordered creation-time
//! transformations.
//!
//! The registry is an explicit, constructed object passed by reference to
//! every graph object — no global mutable state; tests build their own
//! instance. Registration is additive with no unregistration; lookups are
//! total functions where absence means "generic fallback behavior".
//! Attribute-set membership and every lookup walk the declared parent
//! chain, so kinds inherit what their ancestors registered.

pub mod keys;
pub mod convert;
pub mod relation;
pub mod notion;
pub mod group;
pub mod transform;

use std::fmt;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use tracing::warn;

use crate::model::Value;
use crate::validation::PropertyValidator;

pub use keys::PropKey;
pub use convert::{BooleanConverter, DateConverter, PropertyConverter};
pub use relation::{Cardinality, RelationDecl};
pub use notion::{Notion, ObjectNotion, PropertyNotion};
pub use group::{MapPropertyGroup, PropertyGroup};
pub use transform::{CreationTransformation, TransformContext, UuidCreation};

// ============================================================================
// Entity types and views
// ============================================================================

/// A registered entity kind, node or relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityType(&'static str);

impl EntityType {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The generic node kind every concrete node kind descends from.
pub const GENERIC_NODE: EntityType = EntityType::new("GenericNode");
/// The generic relationship kind.
pub const GENERIC_REL: EntityType = EntityType::new("GenericRelationship");

/// A named projection of an entity type's attribute set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct View(&'static str);

impl View {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }

    pub const ALL: View = View::new("all");
    pub const PUBLIC: View = View::new("public");
    pub const UI: View = View::new("ui");
}

// ============================================================================
// SchemaRegistry
// ============================================================================

type TypeKey = (&'static str, &'static str);

#[derive(Default)]
pub struct SchemaRegistry {
    parents: HashMap<&'static str, EntityType>,
    property_sets: HashMap<(&'static str, &'static str), Vec<PropKey>>,
    converters: HashMap<TypeKey, Arc<dyn PropertyConverter>>,
    conversion_params: HashMap<TypeKey, Value>,
    defaults: HashMap<TypeKey, Value>,
    read_only: HashSet<TypeKey>,
    write_once: HashSet<TypeKey>,
    relations: HashMap<TypeKey, Arc<RelationDecl>>,
    groups: HashMap<TypeKey, Arc<dyn PropertyGroup>>,
    validators: HashMap<&'static str, Vec<(PropKey, Arc<dyn PropertyValidator>)>>,
    transformations: HashMap<&'static str, Vec<Arc<dyn CreationTransformation>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the two generic kinds and their core schema: the
    /// shared key set on the `all`/`ui` views, date and boolean converters
    /// for the core temporal/flag keys, read-only identity keys, and the
    /// mandatory uuid creation transformation.
    pub fn with_core_types() -> Self {
        use keys::core as k;

        let mut reg = Self::new();
        for t in [GENERIC_NODE, GENERIC_REL] {
            reg.register_type(t, None);
            reg.register_property_set(
                t,
                View::ALL,
                &[
                    k::UUID, k::TYPE, k::NAME, k::CREATED_BY, k::CREATED_DATE,
                    k::LAST_MODIFIED_DATE, k::HIDDEN, k::DELETED,
                    k::VISIBILITY_START_DATE, k::VISIBILITY_END_DATE,
                    k::VISIBLE_TO_PUBLIC, k::VISIBLE_TO_AUTHENTICATED,
                ],
            );
            reg.register_property_set(
                t,
                View::UI,
                &[k::UUID, k::TYPE, k::NAME, k::CREATED_DATE, k::LAST_MODIFIED_DATE],
            );
            for key in [
                k::CREATED_DATE, k::LAST_MODIFIED_DATE,
                k::VISIBILITY_START_DATE, k::VISIBILITY_END_DATE,
            ] {
                reg.register_converter(t, key, Arc::new(DateConverter));
            }
            for key in [
                k::HIDDEN, k::DELETED, k::VISIBLE_TO_PUBLIC, k::VISIBLE_TO_AUTHENTICATED,
            ] {
                reg.register_converter(t, key, Arc::new(BooleanConverter));
            }
            reg.register_read_only(t, k::UUID);
            reg.register_read_only(t, k::TYPE);
            reg.register_read_only(t, k::CREATED_DATE);
            reg.register_creation_transformation(t, Arc::new(UuidCreation));
        }
        reg
    }

    // ========================================================================
    // Registration (additive, no unregistration)
    // ========================================================================

    pub fn register_type(&mut self, t: EntityType, parent: Option<EntityType>) {
        if let Some(p) = parent {
            self.parents.insert(t.name(), p);
        } else {
            self.parents.remove(t.name());
        }
    }

    pub fn register_property_set(&mut self, t: EntityType, view: View, set: &[PropKey]) {
        let entry = self
            .property_sets
            .entry((t.name(), view.name()))
            .or_default();
        for key in set {
            if !entry.contains(key) {
                entry.push(*key);
            }
        }
    }

    pub fn register_converter(
        &mut self,
        t: EntityType,
        key: PropKey,
        converter: Arc<dyn PropertyConverter>,
    ) {
        self.converters.insert((t.name(), key.name()), converter);
    }

    pub fn register_conversion_param(&mut self, t: EntityType, key: PropKey, param: Value) {
        self.conversion_params.insert((t.name(), key.name()), param);
    }

    pub fn register_default(&mut self, t: EntityType, key: PropKey, value: Value) {
        self.defaults.insert((t.name(), key.name()), value);
    }

    pub fn register_read_only(&mut self, t: EntityType, key: PropKey) {
        self.read_only.insert((t.name(), key.name()));
    }

    pub fn register_write_once(&mut self, t: EntityType, key: PropKey) {
        self.write_once.insert((t.name(), key.name()));
    }

    /// Register an edge-backed property. At most one declaration may
    /// resolve a (source type, key) pair; a duplicate registration
    /// replaces the earlier one with a warning.
    pub fn register_relation(&mut self, decl: RelationDecl) {
        let slot = (decl.source_type, decl.key.name());
        if self.relations.insert(slot, Arc::new(decl)).is_some() {
            warn!(entity_type = slot.0, key = slot.1, "replacing relation declaration");
        }
    }

    pub fn register_property_group(
        &mut self,
        t: EntityType,
        key: PropKey,
        group: Arc<dyn PropertyGroup>,
    ) {
        self.groups.insert((t.name(), key.name()), group);
    }

    pub fn register_validator(
        &mut self,
        t: EntityType,
        key: PropKey,
        validator: Arc<dyn PropertyValidator>,
    ) {
        self.validators
            .entry(t.name())
            .or_default()
            .push((key, validator));
    }

    pub fn register_creation_transformation(
        &mut self,
        t: EntityType,
        transformation: Arc<dyn CreationTransformation>,
    ) {
        let list = self.transformations.entry(t.name()).or_default();
        list.push(transformation);
        list.sort_by_key(|t| t.order());
    }

    // ========================================================================
    // Lookup (total: absence is a valid result)
    // ========================================================================

    /// Self-first ancestor chain for `t`. Cycles in parent declarations
    /// are cut at the first repeated type.
    fn lineage(&self, t: EntityType) -> Vec<EntityType> {
        let mut chain = vec![t];
        let mut current = t;
        while let Some(parent) = self.parents.get(current.name()) {
            if chain.contains(parent) {
                break;
            }
            chain.push(*parent);
            current = *parent;
        }
        chain
    }

    fn find<'a, V>(&self, map: &'a HashMap<TypeKey, V>, t: EntityType, key: PropKey) -> Option<&'a V> {
        self.lineage(t)
            .into_iter()
            .find_map(|ty| map.get(&(ty.name(), key.name())))
    }

    /// Declared attribute set for a view, additive across the ancestor
    /// chain (ancestor declarations first).
    pub fn property_set(&self, t: EntityType, view: View) -> Vec<PropKey> {
        let mut keys: Vec<PropKey> = Vec::new();
        for ty in self.lineage(t).into_iter().rev() {
            if let Some(set) = self.property_sets.get(&(ty.name(), view.name())) {
                for key in set {
                    if !keys.contains(key) {
                        keys.push(*key);
                    }
                }
            }
        }
        keys
    }

    pub fn converter(&self, t: EntityType, key: PropKey) -> Option<Arc<dyn PropertyConverter>> {
        self.find(&self.converters, t, key).cloned()
    }

    pub fn conversion_param(&self, t: EntityType, key: PropKey) -> Option<Value> {
        self.find(&self.conversion_params, t, key).cloned()
    }

    pub fn default_value(&self, t: EntityType, key: PropKey) -> Option<Value> {
        self.find(&self.defaults, t, key).cloned()
    }

    pub fn is_read_only(&self, t: EntityType, key: PropKey) -> bool {
        self.lineage(t)
            .iter()
            .any(|ty| self.read_only.contains(&(ty.name(), key.name())))
    }

    pub fn is_write_once(&self, t: EntityType, key: PropKey) -> bool {
        self.lineage(t)
            .iter()
            .any(|ty| self.write_once.contains(&(ty.name(), key.name())))
    }

    pub fn relation(&self, t: EntityType, key: PropKey) -> Option<Arc<RelationDecl>> {
        self.find(&self.relations, t, key).cloned()
    }

    /// The declaration connecting two entity kinds, if one is registered
    /// (used when linking a parent and child whose relation key is not
    /// known to the caller).
    pub fn relation_between(
        &self,
        source: EntityType,
        target: EntityType,
    ) -> Option<Arc<RelationDecl>> {
        let targets: Vec<&'static str> =
            self.lineage(target).iter().map(|t| t.name()).collect();
        self.lineage(source).into_iter().find_map(|ty| {
            self.relations
                .values()
                .find(|d| d.source_type == ty.name() && targets.contains(&d.target_type))
                .cloned()
        })
    }

    pub fn property_group(&self, t: EntityType, key: PropKey) -> Option<Arc<dyn PropertyGroup>> {
        self.find(&self.groups, t, key).cloned()
    }

    /// All validators registered along the ancestor chain.
    pub fn validators(&self, t: EntityType) -> Vec<(PropKey, Arc<dyn PropertyValidator>)> {
        let mut out = Vec::new();
        for ty in self.lineage(t).into_iter().rev() {
            if let Some(list) = self.validators.get(ty.name()) {
                out.extend(list.iter().map(|(k, v)| (*k, v.clone())));
            }
        }
        out
    }

    /// All creation transformations along the ancestor chain, lowest
    /// order first.
    pub fn transformations(&self, t: EntityType) -> Vec<Arc<dyn CreationTransformation>> {
        let mut out: Vec<Arc<dyn CreationTransformation>> = Vec::new();
        for ty in self.lineage(t).into_iter().rev() {
            if let Some(list) = self.transformations.get(ty.name()) {
                out.extend(list.iter().cloned());
            }
        }
        out.sort_by_key(|t| t.order());
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: EntityType = EntityType::new("Page");
    const TITLE: PropKey = PropKey::new("title");

    #[test]
    fn test_property_set_is_additive_across_ancestors() {
        let mut reg = SchemaRegistry::with_core_types();
        reg.register_type(PAGE, Some(GENERIC_NODE));
        reg.register_property_set(PAGE, View::ALL, &[TITLE]);

        let set = reg.property_set(PAGE, View::ALL);
        assert!(set.contains(&keys::core::UUID));
        assert!(set.contains(&TITLE));
        // ancestor keys come first
        assert!(set.iter().position(|k| *k == keys::core::UUID).unwrap()
            < set.iter().position(|k| *k == TITLE).unwrap());
    }

    #[test]
    fn test_lookup_walks_parent_chain() {
        let mut reg = SchemaRegistry::with_core_types();
        reg.register_type(PAGE, Some(GENERIC_NODE));

        assert!(reg.converter(PAGE, keys::core::CREATED_DATE).is_some());
        assert!(reg.is_read_only(PAGE, keys::core::UUID));
        assert!(!reg.is_read_only(PAGE, TITLE));
    }

    #[test]
    fn test_absence_is_not_an_error() {
        let reg = SchemaRegistry::with_core_types();
        assert!(reg.converter(GENERIC_NODE, TITLE).is_none());
        assert!(reg.default_value(GENERIC_NODE, TITLE).is_none());
        assert!(reg.relation(GENERIC_NODE, TITLE).is_none());
    }

    #[test]
    fn test_uuid_transformation_runs_first() {
        struct Late;
        impl CreationTransformation for Late {
            fn order(&self) -> i32 { 10 }
            fn apply(
                &self,
                _ctx: &TransformContext<'_>,
                _props: &mut crate::model::PropertyMap,
            ) -> crate::Result<()> {
                Ok(())
            }
        }

        let mut reg = SchemaRegistry::with_core_types();
        reg.register_creation_transformation(GENERIC_NODE, Arc::new(Late));

        let orders: Vec<i32> = reg
            .transformations(GENERIC_NODE)
            .iter()
            .map(|t| t.order())
            .collect();
        assert_eq!(orders, vec![0, 10]);
    }
}
