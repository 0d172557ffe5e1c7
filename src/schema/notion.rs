//! Relation adapters ("notions").
//!
//! A notion maps a graph relationship to the scalar or collection value an
//! edge-backed property exposes, and back: the getter side adapts a related
//! node record into a value, the setter side turns an input value into a
//! search predicate that identifies the target node.

use std::sync::Arc;

use crate::model::{NodeRecord, Value};
use crate::schema::keys::{self, PropKey};
use crate::{Error, Result};

/// Adapter between a related node and the property value it represents.
pub trait Notion: Send + Sync {
    /// Related node → property value.
    fn adapt_for_getter(&self, record: &NodeRecord) -> Result<Value>;

    /// Input value → `(attribute name, value)` predicate resolving the
    /// target node through the search collaborator.
    fn adapt_for_setter(&self, value: &Value) -> Result<(String, Value)>;
}

// ============================================================================
// PropertyNotion
// ============================================================================

/// Represents the related node by one of its attributes (canonically the
/// uuid): reading yields that attribute's value, writing looks the target
/// up by it.
pub struct PropertyNotion {
    key: PropKey,
}

impl PropertyNotion {
    pub fn new(key: PropKey) -> Self {
        Self { key }
    }

    /// The default notion: relate by stable uuid.
    pub fn by_uuid() -> Arc<dyn Notion> {
        Arc::new(Self::new(keys::core::UUID))
    }
}

impl Notion for PropertyNotion {
    fn adapt_for_getter(&self, record: &NodeRecord) -> Result<Value> {
        Ok(record.get(self.key.name()).cloned().unwrap_or(Value::Null))
    }

    fn adapt_for_setter(&self, value: &Value) -> Result<(String, Value)> {
        if value.is_empty() {
            return Err(Error::ReferenceNotFound(format!(
                "empty {} given for edge-backed property",
                self.key
            )));
        }
        Ok((self.key.name().to_string(), value.clone()))
    }
}

// ============================================================================
// ObjectNotion
// ============================================================================

/// Represents the related node as a map of all its attributes. The setter
/// side still resolves by uuid, taken from the map or from a bare string.
pub struct ObjectNotion;

impl Notion for ObjectNotion {
    fn adapt_for_getter(&self, record: &NodeRecord) -> Result<Value> {
        Ok(Value::Map(record.properties.clone()))
    }

    fn adapt_for_setter(&self, value: &Value) -> Result<(String, Value)> {
        let uuid = match value {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            Value::Map(m) => match m.get(keys::core::UUID.name()).and_then(Value::as_str) {
                Some(s) => s.to_string(),
                None => {
                    return Err(Error::ReferenceNotFound(
                        "related object value carries no uuid".into(),
                    ));
                }
            },
            other => {
                return Err(Error::ReferenceNotFound(format!(
                    "cannot resolve edge target from {} value",
                    other.type_name()
                )));
            }
        };
        Ok((keys::core::UUID.name().to_string(), Value::String(uuid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    #[test]
    fn test_property_notion_getter() {
        let record = NodeRecord::new(NodeId(1)).with_property("uuid", "abc");
        let notion = PropertyNotion::new(keys::core::UUID);
        assert_eq!(notion.adapt_for_getter(&record).unwrap(), Value::from("abc"));
    }

    #[test]
    fn test_property_notion_setter_rejects_empty() {
        let notion = PropertyNotion::new(keys::core::UUID);
        assert!(notion.adapt_for_setter(&Value::from("")).is_err());
        let (key, val) = notion.adapt_for_setter(&Value::from("abc")).unwrap();
        assert_eq!(key, "uuid");
        assert_eq!(val, Value::from("abc"));
    }

    #[test]
    fn test_object_notion_setter_from_map() {
        let notion = ObjectNotion;
        let mut m = crate::model::PropertyMap::new();
        m.insert("uuid".into(), Value::from("abc"));
        let (key, val) = notion.adapt_for_setter(&Value::Map(m)).unwrap();
        assert_eq!(key, "uuid");
        assert_eq!(val, Value::from("abc"));
    }
}
