//! Attribute keys.
//!
//! Keys are closed, compile-time constants: each entity kind declares its
//! key table as `pub const` items, and cross-cutting keys shared by every
//! kind live in the [`core`] module re-exported at the crate root as
//! `keys`. Equality and hashing go by name, so the same name declared in
//! two tables is the same key.

use std::fmt;

use serde::Serialize;

/// A type-scoped, unique symbolic attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PropKey(&'static str);

impl PropKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Keys shared by every entity kind.
pub mod core {
    use super::PropKey;

    /// Stable, collision-resistant identifier (32 alphanumeric chars).
    pub const UUID: PropKey = PropKey::new("uuid");
    /// Declared entity type name.
    pub const TYPE: PropKey = PropKey::new("type");
    /// Display name; objects without one sort before named ones.
    pub const NAME: PropKey = PropKey::new("name");
    pub const CREATED_BY: PropKey = PropKey::new("createdBy");
    pub const CREATED_DATE: PropKey = PropKey::new("createdDate");
    /// Stamped on every scalar write; direct writes are dropped.
    pub const LAST_MODIFIED_DATE: PropKey = PropKey::new("lastModifiedDate");
    pub const HIDDEN: PropKey = PropKey::new("hidden");
    pub const DELETED: PropKey = PropKey::new("deleted");
    pub const VISIBILITY_START_DATE: PropKey = PropKey::new("visibilityStartDate");
    pub const VISIBILITY_END_DATE: PropKey = PropKey::new("visibilityEndDate");
    pub const VISIBLE_TO_PUBLIC: PropKey = PropKey::new("visibleToPublicUsers");
    pub const VISIBLE_TO_AUTHENTICATED: PropKey = PropKey::new("visibleToAuthenticatedUsers");
}

/// Keys specific to relationships.
pub mod rel {
    use super::PropKey;

    /// Derived `<startType>/<label>/<endType>` tag for fast type-scoped
    /// edge lookup.
    pub const COMBINED_TYPE: PropKey = PropKey::new("combinedType");
    /// Tags an edge as belonging to a reusable component instance.
    pub const COMPONENT_ID: PropKey = PropKey::new("componentId");
}

/// Keys used by the tree position encoder on content-bearing nodes.
pub mod tree {
    use super::PropKey;

    /// Marks a content node as data-bound rather than literal.
    pub const DATA_KEY: PropKey = PropKey::new("data-key");
    /// The set of tree addresses under which a node is reachable.
    pub const PATHS: PropKey = PropKey::new("paths");
}
