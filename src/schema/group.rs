//! Property groups.
//!
//! A property group intercepts one attribute key and maps a set of member
//! attributes to and from a single map value, so a cluster of scalars can
//! be read and written as one unit.

use crate::model::{PropertyMap, Value};
use crate::schema::keys::PropKey;
use crate::Result;

/// Read callback: raw stored value for a member key name.
pub type RawReader<'a> = dyn FnMut(&str) -> Result<Option<Value>> + 'a;
/// Write callback: raw stored value for a member key name; None removes.
pub type RawWriter<'a> = dyn FnMut(&str, Option<Value>) -> Result<()> + 'a;

pub trait PropertyGroup: Send + Sync {
    fn member_keys(&self) -> &[PropKey];

    /// Assemble the grouped value from the members' raw stored values.
    fn grouped(&self, read: &mut RawReader<'_>) -> Result<Value>;

    /// Distribute a grouped value onto the members. A `Null` value clears
    /// every member.
    fn set_grouped(&self, value: &Value, write: &mut RawWriter<'_>) -> Result<()>;
}

// ============================================================================
// MapPropertyGroup
// ============================================================================

/// The standard group: members appear as entries of one `Value::Map`.
pub struct MapPropertyGroup {
    members: Vec<PropKey>,
}

impl MapPropertyGroup {
    pub fn new(members: impl IntoIterator<Item = PropKey>) -> Self {
        Self { members: members.into_iter().collect() }
    }
}

impl PropertyGroup for MapPropertyGroup {
    fn member_keys(&self) -> &[PropKey] {
        &self.members
    }

    fn grouped(&self, read: &mut RawReader<'_>) -> Result<Value> {
        let mut map = PropertyMap::new();
        for key in &self.members {
            if let Some(value) = read(key.name())? {
                map.insert(key.name().to_string(), value);
            }
        }
        Ok(Value::Map(map))
    }

    fn set_grouped(&self, value: &Value, write: &mut RawWriter<'_>) -> Result<()> {
        match value {
            Value::Null => {
                for key in &self.members {
                    write(key.name(), None)?;
                }
                Ok(())
            }
            Value::Map(map) => {
                for key in &self.members {
                    write(key.name(), map.get(key.name()).cloned())?;
                }
                Ok(())
            }
            other => Err(crate::Error::Conversion {
                key: "propertyGroup".into(),
                detail: format!("expected MAP or NULL, got {}", other.type_name()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_group_round_trip() {
        let group = MapPropertyGroup::new([PropKey::new("lat"), PropKey::new("lon")]);

        let mut backing = PropertyMap::new();
        backing.insert("lat".into(), Value::Float(52.5));
        backing.insert("lon".into(), Value::Float(13.4));

        let grouped = group
            .grouped(&mut |k| Ok(backing.get(k).cloned()))
            .unwrap();
        let Value::Map(m) = &grouped else { panic!("expected map") };
        assert_eq!(m.get("lat"), Some(&Value::Float(52.5)));

        let mut written = PropertyMap::new();
        group
            .set_grouped(&grouped, &mut |k, v| {
                if let Some(v) = v {
                    written.insert(k.to_string(), v);
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(written, backing);
    }
}
