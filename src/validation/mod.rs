//! # Validation Subsystem
//!
//! Checks accumulate typed error tokens per entity-type/attribute into an
//! [`ErrorBuffer`]. An object starts `Valid` (empty buffer), becomes
//! `Checked` once its rules ran, and is `Rejected` when a lifecycle hook
//! finds the buffer non-empty — rejection aborts the enclosing
//! transaction and no partial writes persist.

pub mod error;
pub mod validators;

pub use error::{ErrorBuffer, ErrorToken};
pub use validators::{
    check_date, check_dates_chronological, check_null_or_value_in_set,
    check_property_present, check_string_min_length, check_string_not_blank,
    check_value_in_set, PropertyValidator, TypeUniquenessValidator,
};

use crate::object::GraphObject;
use crate::schema::{EntityType, SchemaRegistry};
use crate::Result;

/// Run every validator registered for `entity_type` (including inherited
/// ones) against `obj`, filing tokens into `buffer`.
pub fn run_registered(
    registry: &SchemaRegistry,
    entity_type: EntityType,
    obj: &dyn GraphObject,
    buffer: &mut ErrorBuffer,
) -> Result<()> {
    for (key, validator) in registry.validators(entity_type) {
        validator.is_valid(obj, key, buffer)?;
    }
    Ok(())
}
