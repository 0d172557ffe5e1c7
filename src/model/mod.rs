//! # Property Graph Model
//!
//! Clean DTOs that cross every boundary: storage ↔ schema ↔ objects ↔ user.
//!
//! Design rule: this module is pure data — no I/O, no registry access,
//! no locking.

pub mod node;
pub mod relationship;
pub mod value;
pub mod property_map;

pub use node::{NodeRecord, NodeId};
pub use relationship::{RelRecord, RelId, Direction};
pub use value::Value;
pub use property_map::PropertyMap;
