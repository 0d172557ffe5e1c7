//! Validation checks.
//!
//! Two layers, matching how the checks are consumed:
//!
//! - free helper functions for ad-hoc checks inside lifecycle hooks;
//!   each appends at most one token per failed rule and returns the
//!   error flag (`true` = a token was filed)
//! - the [`PropertyValidator`] trait for checks registered in the schema
//!   per (type, key); these return `Ok(true)` when the value is valid
//!
//! Infrastructure failures (storage, conversion) propagate as `Err` and
//! are distinct from validation outcomes.

use std::sync::Arc;

use crate::model::Value;
use crate::object::GraphObject;
use crate::schema::keys::{self, PropKey};
use crate::search::SearchIndex;
use crate::Result;

use super::{ErrorBuffer, ErrorToken};

// ============================================================================
// Helper checks
// ============================================================================

pub fn check_string_not_blank(
    obj: &dyn GraphObject,
    key: PropKey,
    buffer: &mut ErrorBuffer,
) -> Result<bool> {
    match obj.get_value(key)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(false),
        _ => {
            buffer.add(obj.graph_type(), ErrorToken::EmptyOrBlank { key: key.name() });
            Ok(true)
        }
    }
}

pub fn check_string_min_length(
    obj: &dyn GraphObject,
    key: PropKey,
    min: usize,
    buffer: &mut ErrorBuffer,
) -> Result<bool> {
    match obj.get_value(key)? {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            if s.chars().count() >= min {
                Ok(false)
            } else {
                buffer.add(obj.graph_type(), ErrorToken::TooShort { key: key.name(), min });
                Ok(true)
            }
        }
        _ => {
            buffer.add(obj.graph_type(), ErrorToken::EmptyOrBlank { key: key.name() });
            Ok(true)
        }
    }
}

/// Presence check. Edge-backed collections count as present when they
/// hold at least one element.
pub fn check_property_present(
    obj: &dyn GraphObject,
    key: PropKey,
    buffer: &mut ErrorBuffer,
) -> Result<bool> {
    match obj.get_value(key)? {
        Some(value) if !value.is_empty() => Ok(false),
        _ => {
            buffer.add(obj.graph_type(), ErrorToken::EmptyOrBlank { key: key.name() });
            Ok(true)
        }
    }
}

/// A date is present when it converts to a timestamp other than epoch 0.
pub fn check_date(
    obj: &dyn GraphObject,
    key: PropKey,
    buffer: &mut ErrorBuffer,
) -> Result<bool> {
    match obj.get_value(key)? {
        Some(Value::DateTime(dt)) if dt.timestamp_millis() != 0 => Ok(false),
        _ => {
            buffer.add(obj.graph_type(), ErrorToken::EmptyOrBlank { key: key.name() });
            Ok(true)
        }
    }
}

/// Both dates must be present and `first` strictly before `second`.
pub fn check_dates_chronological(
    obj: &dyn GraphObject,
    first: PropKey,
    second: PropKey,
    buffer: &mut ErrorBuffer,
) -> Result<bool> {
    let mut error = false;
    error |= check_date(obj, first, buffer)?;
    error |= check_date(obj, second, buffer)?;

    let d1 = obj.get_value(first)?.and_then(|v| v.as_datetime());
    let d2 = obj.get_value(second)?.and_then(|v| v.as_datetime());
    if let (Some(d1), Some(d2)) = (d1, d2) {
        if d1 >= d2 {
            buffer.add(
                obj.graph_type(),
                ErrorToken::ChronologicalOrder { first: first.name(), second: second.name() },
            );
            error = true;
        }
    }

    Ok(error)
}

/// Membership in an explicit set (also covers enum-valued attributes:
/// pass the variant names).
pub fn check_value_in_set(
    obj: &dyn GraphObject,
    key: PropKey,
    allowed: &[&str],
    buffer: &mut ErrorBuffer,
) -> Result<bool> {
    match obj.get_value(key)? {
        Some(Value::String(s)) if !s.trim().is_empty() && allowed.contains(&s.as_str()) => {
            Ok(false)
        }
        _ => {
            buffer.add(
                obj.graph_type(),
                ErrorToken::ValueNotInSet {
                    key: key.name(),
                    allowed: allowed.iter().map(|s| s.to_string()).collect(),
                },
            );
            Ok(true)
        }
    }
}

/// Like [`check_value_in_set`] but an absent value passes.
pub fn check_null_or_value_in_set(
    obj: &dyn GraphObject,
    key: PropKey,
    allowed: &[&str],
    buffer: &mut ErrorBuffer,
) -> Result<bool> {
    match obj.get_value(key)? {
        None | Some(Value::Null) => Ok(false),
        _ => check_value_in_set(obj, key, allowed, buffer),
    }
}

// ============================================================================
// Registered validators
// ============================================================================

/// A check registered in the schema for one (type, key) pair, run by the
/// lifecycle hooks. `Ok(true)` means valid; failing rules file tokens and
/// return `Ok(false)`.
pub trait PropertyValidator: Send + Sync {
    fn is_valid(
        &self,
        obj: &dyn GraphObject,
        key: PropKey,
        buffer: &mut ErrorBuffer,
    ) -> Result<bool>;
}

/// Rejects a value already carried by another entity of the same type.
///
/// The check queries the search collaborator and is not atomic with the
/// subsequent commit: two concurrent creators can both pass and both
/// commit. Known, accepted gap — callers needing a hard guarantee must
/// back the attribute with a store-level constraint.
pub struct TypeUniquenessValidator {
    type_name: &'static str,
    index: Arc<dyn SearchIndex>,
}

impl TypeUniquenessValidator {
    pub fn new(type_name: &'static str, index: Arc<dyn SearchIndex>) -> Self {
        Self { type_name, index }
    }
}

impl PropertyValidator for TypeUniquenessValidator {
    fn is_valid(
        &self,
        obj: &dyn GraphObject,
        key: PropKey,
        buffer: &mut ErrorBuffer,
    ) -> Result<bool> {
        let Some(value) = obj.get_value(key)? else {
            buffer.add(obj.graph_type(), ErrorToken::EmptyOrBlank { key: key.name() });
            return Ok(false);
        };
        if value.is_empty() {
            buffer.add(obj.graph_type(), ErrorToken::EmptyOrBlank { key: key.name() });
            return Ok(false);
        }

        let own_uuid = obj.get_value(keys::core::UUID)?;
        let existing = self
            .index
            .find_nodes(Some(self.type_name), key.name(), &value)?
            .into_iter()
            // the object under validation is already stored; skip it
            .find(|record| {
                record.uuid().map(|u| Value::from(u)).as_ref() != own_uuid.as_ref()
            });

        if let Some(record) = existing {
            buffer.add(
                obj.graph_type(),
                ErrorToken::Uniqueness {
                    key: key.name(),
                    value: value.to_string(),
                    existing_uuid: record.uuid().unwrap_or_default().to_string(),
                },
            );
            return Ok(false);
        }

        Ok(true)
    }
}
