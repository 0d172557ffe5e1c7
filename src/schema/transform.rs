//! Creation-time transformations.
//!
//! A totally ordered list of transformations runs once per entity type at
//! object-creation commit time, against the staged attribute map. The
//! mandatory order-0 transformation assigns a collision-resistant uuid to
//! objects that lack one; user-supplied transformations run after it.

use crate::ident::IdGenerator;
use crate::model::{PropertyMap, Value};
use crate::schema::keys;
use crate::Result;

/// Collaborators available to transformations.
pub struct TransformContext<'a> {
    pub ids: &'a dyn IdGenerator,
}

pub trait CreationTransformation: Send + Sync {
    /// Lowest order runs first. Order 0 is reserved for uuid assignment.
    fn order(&self) -> i32;

    fn apply(&self, ctx: &TransformContext<'_>, props: &mut PropertyMap) -> Result<()>;
}

// ============================================================================
// UuidCreation
// ============================================================================

/// Assigns a fresh uuid when the staged attributes carry none (or a blank
/// one). Idempotent: an existing uuid is kept.
pub struct UuidCreation;

impl CreationTransformation for UuidCreation {
    fn order(&self) -> i32 {
        0
    }

    fn apply(&self, ctx: &TransformContext<'_>, props: &mut PropertyMap) -> Result<()> {
        let blank = match props.get(keys::core::UUID.name()) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if blank {
            props.insert(
                keys::core::UUID.name().to_string(),
                Value::String(ctx.ids.next_id()),
            );
        }
        Ok(())
    }
}
