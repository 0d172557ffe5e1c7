//! Value conversion pipeline.
//!
//! Converters translate between the stored representation of an attribute
//! and its typed application value, in both directions, plus a sort
//! conversion used when ordering objects by a converted attribute.

use chrono::{DateTime, Utc};

use crate::model::Value;
use crate::{Error, Result};

/// Bidirectional converter between stored and runtime representation.
///
/// `param` is the optional conversion parameter registered alongside the
/// converter (e.g. a date format or an allowed range).
pub trait PropertyConverter: Send + Sync {
    /// stored → runtime
    fn convert_for_getter(&self, value: Value, param: Option<&Value>) -> Result<Value>;

    /// runtime → stored
    fn convert_for_setter(&self, value: Value, param: Option<&Value>) -> Result<Value>;

    /// raw stored → comparison key for ordering. Defaults to the getter
    /// conversion.
    fn convert_for_sorting(&self, value: Value, param: Option<&Value>) -> Result<Value> {
        self.convert_for_getter(value, param)
    }
}

fn conversion_err(key: &str, value: &Value) -> Error {
    Error::Conversion {
        key: key.to_string(),
        detail: format!("unexpected {} value {value}", value.type_name()),
    }
}

// ============================================================================
// BooleanConverter
// ============================================================================

/// Booleans stored natively, with legacy string forms (`"true"`/`"false"`)
/// accepted on both sides.
pub struct BooleanConverter;

impl PropertyConverter for BooleanConverter {
    fn convert_for_getter(&self, value: Value, _param: Option<&Value>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::String(s) => Ok(Value::Bool(s.eq_ignore_ascii_case("true"))),
            other => Err(conversion_err("boolean", &other)),
        }
    }

    fn convert_for_setter(&self, value: Value, _param: Option<&Value>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::String(s) => Ok(Value::Bool(s.eq_ignore_ascii_case("true"))),
            other => Err(conversion_err("boolean", &other)),
        }
    }
}

// ============================================================================
// DateConverter
// ============================================================================

/// Timestamps stored as epoch milliseconds, surfaced as `DateTime<Utc>`.
/// RFC 3339 strings are accepted on the setter side.
pub struct DateConverter;

impl PropertyConverter for DateConverter {
    fn convert_for_getter(&self, value: Value, _param: Option<&Value>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Int(millis) => match DateTime::<Utc>::from_timestamp_millis(millis) {
                Some(dt) => Ok(Value::DateTime(dt)),
                None => Err(Error::Conversion {
                    key: "date".into(),
                    detail: format!("timestamp {millis} out of range"),
                }),
            },
            Value::DateTime(dt) => Ok(Value::DateTime(dt)),
            other => Err(conversion_err("date", &other)),
        }
    }

    fn convert_for_setter(&self, value: Value, _param: Option<&Value>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::DateTime(dt) => Ok(Value::Int(dt.timestamp_millis())),
            Value::Int(millis) => Ok(Value::Int(millis)),
            Value::String(s) => {
                let dt = DateTime::parse_from_rfc3339(&s).map_err(|e| Error::Conversion {
                    key: "date".into(),
                    detail: format!("cannot parse '{s}': {e}"),
                })?;
                Ok(Value::Int(dt.with_timezone(&Utc).timestamp_millis()))
            }
            other => Err(conversion_err("date", &other)),
        }
    }

    /// Dates compare as their stored millisecond value.
    fn convert_for_sorting(&self, value: Value, _param: Option<&Value>) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Int(millis) => Ok(Value::Int(millis)),
            Value::DateTime(dt) => Ok(Value::Int(dt.timestamp_millis())),
            other => Err(conversion_err("date", &other)),
        }
    }
}
