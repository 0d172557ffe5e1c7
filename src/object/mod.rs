//! # Graph Object Core
//!
//! Rich node and relationship objects implementing attribute get/set
//! against the schema registry and conversion pipeline, with a per-key
//! `{raw, converted}` cache and transactional commit.
//!
//! Objects are request-scoped and single-owner: the caches use interior
//! mutability that is not thread-safe by design.

pub mod node;
pub mod relationship;

use std::cell::Cell;
use std::cmp::Ordering;

use crate::ident::IdGenerator;
use crate::model::Value;
use crate::schema::keys::PropKey;
use crate::schema::{EntityType, SchemaRegistry};
use crate::search::SearchIndex;
use crate::storage::GraphStore;
use crate::{Error, Result};

pub use node::NodeObject;
pub use relationship::RelObject;

// ============================================================================
// GraphContext — the collaborator bundle
// ============================================================================

/// Everything a graph object needs: the store, the schema, the search
/// collaborator and the identity generator. Cheap to copy; one per
/// request is the expected shape.
pub struct GraphContext<'g, S: GraphStore> {
    pub store: &'g S,
    pub registry: &'g SchemaRegistry,
    pub index: &'g dyn SearchIndex,
    pub ids: &'g dyn IdGenerator,
}

impl<'g, S: GraphStore> Clone for GraphContext<'g, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'g, S: GraphStore> Copy for GraphContext<'g, S> {}

// ============================================================================
// GraphObject — the uniform attribute surface
// ============================================================================

/// Uniform read surface over nodes and relationships, used by the
/// validation subsystem and by generic comparators.
pub trait GraphObject {
    /// The entity type name.
    fn graph_type(&self) -> &str;

    /// Resolved (converted) attribute value. Unknown keys resolve to
    /// `None`, never an error.
    fn get_value(&self, key: PropKey) -> Result<Option<Value>>;
}

/// Lexicographic order by display name; unnamed objects sort before named
/// ones. Resolution failures count as unnamed.
pub fn compare_by_display_name(a: &dyn GraphObject, b: &dyn GraphObject) -> Ordering {
    let name = |o: &dyn GraphObject| -> Option<String> {
        o.get_value(crate::schema::keys::core::NAME)
            .ok()
            .flatten()
            .and_then(|v| v.as_str().map(str::to_owned))
    };
    match (name(a), name(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

// ============================================================================
// Shared internals
// ============================================================================

/// One cache slot per key: the raw stored value and its converted form,
/// filled lazily and invalidated together on write.
#[derive(Default, Clone)]
pub(crate) struct CacheEntry {
    pub raw: Option<Value>,
    pub converted: Option<Value>,
}

/// Read-only / write-once gate with the one-shot unlock flag. The flag
/// resets on the first gated write attempt, successful or not.
pub(crate) fn read_only_guard(
    registry: &SchemaRegistry,
    t: EntityType,
    key: PropKey,
    has_stored_value: bool,
    unlocked: &Cell<bool>,
) -> Result<()> {
    let gated = registry.is_read_only(t, key)
        || (registry.is_write_once(t, key) && has_stored_value);
    if gated {
        if unlocked.get() {
            unlocked.set(false);
        } else {
            return Err(Error::ReadOnlyViolation(key.name()));
        }
    }
    Ok(())
}

/// Apply the registered setter conversion, if any.
pub(crate) fn convert_for_setter(
    registry: &SchemaRegistry,
    t: EntityType,
    key: PropKey,
    value: Value,
) -> Result<Value> {
    match registry.converter(t, key) {
        Some(converter) => {
            let param = registry.conversion_param(t, key);
            converter.convert_for_setter(value, param.as_ref())
        }
        None => Ok(value),
    }
}

/// Apply the registered getter conversion, if any.
pub(crate) fn convert_for_getter(
    registry: &SchemaRegistry,
    t: EntityType,
    key: PropKey,
    value: Value,
) -> Result<Value> {
    match registry.converter(t, key) {
        Some(converter) => {
            let param = registry.conversion_param(t, key);
            converter.convert_for_getter(value, param.as_ref())
        }
        None => Ok(value),
    }
}

/// Apply the registered sort conversion, if any.
pub(crate) fn convert_for_sorting(
    registry: &SchemaRegistry,
    t: EntityType,
    key: PropKey,
    value: Value,
) -> Result<Value> {
    match registry.converter(t, key) {
        Some(converter) => {
            let param = registry.conversion_param(t, key);
            converter.convert_for_sorting(value, param.as_ref())
        }
        None => Ok(value),
    }
}

/// Treat `Null` as absent so writes and comparisons share one notion of
/// emptiness.
pub(crate) fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}
