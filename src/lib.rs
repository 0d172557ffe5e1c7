//! # schemagraph — Typed, Schema-Governed Property Graph Core
//!
//! Nodes and typed relationships expose a uniform key/value attribute
//! interface whose values may be stored directly, computed from schema
//! defaults, derived from converters, or synthesized from adjacent
//! relationships. On top sits a positional-ordering scheme that lets one
//! shared subtree carry an independent child ordering per logical parent
//! ("context"), encoded as per-context attributes on the connecting edges.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between this core and
//!    any storage engine; `SearchIndex` and `IdGenerator` are the other
//!    two collaborators
//! 2. **Explicit schema**: a constructed [`SchemaRegistry`] is passed to
//!    every graph object — no global mutable state
//! 3. **Clean DTOs**: `NodeRecord`, `RelRecord`, `Value` cross all
//!    boundaries; the rich objects live in `object`
//! 4. **One transaction per logical operation**: subtree moves, creation
//!    with mandatory edges, retargeting — never partially visible
//!
//! ## Quick Start
//!
//! ```rust
//! use schemagraph::{
//!     GraphContext, MemoryIndex, MemoryStore, SchemaRegistry, UuidGenerator,
//!     Value, keys,
//! };
//! use schemagraph::lifecycle::create_node;
//! use schemagraph::schema::GENERIC_NODE;
//!
//! # fn example() -> schemagraph::Result<()> {
//! let store = MemoryStore::new();
//! let registry = SchemaRegistry::with_core_types();
//! let index = MemoryIndex::new(store.clone());
//! let cx = GraphContext {
//!     store: &store,
//!     registry: &registry,
//!     index: &index,
//!     ids: &UuidGenerator,
//! };
//!
//! let node = create_node(cx, GENERIC_NODE, vec![(keys::NAME, Value::from("fragment"))])?;
//! assert_eq!(node.get(keys::NAME)?, Some(Value::from("fragment")));
//! assert_eq!(node.uuid()?.map(|u| u.len()), Some(32));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod schema;
pub mod object;
pub mod tree;
pub mod validation;
pub mod search;
pub mod ident;
pub mod lifecycle;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    NodeRecord, RelRecord, Value, PropertyMap,
    NodeId, RelId, Direction,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{GraphStore, MemoryStore};

// ============================================================================
// Re-exports: Schema
// ============================================================================

pub use schema::{SchemaRegistry, PropKey, EntityType, View, Cardinality};
pub use schema::keys::core as keys;

// ============================================================================
// Re-exports: Objects and collaborators
// ============================================================================

pub use object::{GraphContext, GraphObject, NodeObject, RelObject};
pub use tree::TreeAddress;
pub use validation::{ErrorBuffer, ErrorToken};
pub use search::{SearchIndex, MemoryIndex};
pub use ident::{IdGenerator, UuidGenerator};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transaction error: {0}")]
    Tx(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A referenced entity (retarget endpoint, notion target) could not be
    /// resolved. The enclosing operation leaves prior state untouched.
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Property '{0}' is read-only")]
    ReadOnlyViolation(&'static str),

    /// A position attribute held a value that is neither an integer nor a
    /// numeric string. Schema misuse; aborts the enclosing transaction.
    #[error("Malformed position value for key '{key}': {detail}")]
    MalformedPosition { key: String, detail: String },

    #[error("Conversion error for property '{key}': {detail}")]
    Conversion { key: String, detail: String },

    /// Lifecycle validation produced error tokens; the transaction was
    /// rolled back and no partial writes persist.
    #[error("Validation failed: {0}")]
    ValidationFailed(validation::ErrorBuffer),
}

pub type Result<T> = std::result::Result<T, Error>;
