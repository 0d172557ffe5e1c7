//! Error tokens and the buffer that collects them.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::json;

/// A single failed validation rule, with enough data to render a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ErrorToken {
    EmptyOrBlank { key: &'static str },
    TooShort { key: &'static str, min: usize },
    ValueNotInSet { key: &'static str, allowed: Vec<String> },
    /// `first` must lie strictly before `second`.
    ChronologicalOrder { first: &'static str, second: &'static str },
    ReadOnly { key: &'static str },
    Uniqueness { key: &'static str, value: String, existing_uuid: String },
    IdNotFound { id: String },
    NullArgument { key: &'static str },
}

impl ErrorToken {
    /// The attribute the token is filed under in the buffer.
    pub fn key_name(&self) -> &'static str {
        match self {
            ErrorToken::EmptyOrBlank { key }
            | ErrorToken::TooShort { key, .. }
            | ErrorToken::ValueNotInSet { key, .. }
            | ErrorToken::ReadOnly { key }
            | ErrorToken::Uniqueness { key, .. }
            | ErrorToken::NullArgument { key } => key,
            ErrorToken::ChronologicalOrder { first, .. } => first,
            ErrorToken::IdNotFound { .. } => "id",
        }
    }

    /// Stable machine-readable code for clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorToken::EmptyOrBlank { .. } => "must_not_be_empty",
            ErrorToken::TooShort { .. } => "too_short",
            ErrorToken::ValueNotInSet { .. } => "must_be_one_of",
            ErrorToken::ChronologicalOrder { .. } => "must_lie_before",
            ErrorToken::ReadOnly { .. } => "read_only_property",
            ErrorToken::Uniqueness { .. } => "already_taken",
            ErrorToken::IdNotFound { .. } => "id_not_found",
            ErrorToken::NullArgument { .. } => "may_not_be_null",
        }
    }

    /// Coarse status classification for surfacing to callers.
    pub fn status(&self) -> u16 {
        match self {
            ErrorToken::IdNotFound { .. } => 404,
            ErrorToken::ReadOnly { .. } => 403,
            _ => 422,
        }
    }

    /// Wire-shaped content: `{ "<code>": <detail> }`.
    pub fn json(&self) -> serde_json::Value {
        let detail = match self {
            ErrorToken::EmptyOrBlank { .. } | ErrorToken::NullArgument { .. } => json!(true),
            ErrorToken::TooShort { min, .. } => json!(min),
            ErrorToken::ValueNotInSet { allowed, .. } => json!(allowed),
            ErrorToken::ChronologicalOrder { second, .. } => json!(second),
            ErrorToken::ReadOnly { key } => json!(key),
            ErrorToken::Uniqueness { existing_uuid, .. } => json!(existing_uuid),
            ErrorToken::IdNotFound { id } => json!(id),
        };
        json!({ self.error_code(): detail })
    }
}

// ============================================================================
// ErrorBuffer
// ============================================================================

/// Collects error tokens per entity-type name and attribute, so a
/// lifecycle operation can surface every failed rule at once.
///
/// Presence of any token means the owning operation must not commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBuffer {
    tokens: BTreeMap<String, BTreeMap<&'static str, Vec<ErrorToken>>>,
}

impl ErrorBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a token. Identical tokens for the same type/attribute are
    /// kept once.
    pub fn add(&mut self, type_name: &str, token: ErrorToken) {
        let set = self
            .tokens
            .entry(type_name.to_string())
            .or_default()
            .entry(token.key_name())
            .or_default();
        if !set.contains(&token) {
            set.push(token);
        }
    }

    pub fn has_error(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.tokens
            .values()
            .flat_map(|m| m.values())
            .map(Vec::len)
            .sum()
    }

    /// The worst status among collected tokens (422 when empty).
    pub fn status(&self) -> u16 {
        self.tokens
            .values()
            .flat_map(|m| m.values())
            .flatten()
            .map(ErrorToken::status)
            .max()
            .unwrap_or(422)
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&str, &ErrorToken)> {
        self.tokens.iter().flat_map(|(type_name, by_key)| {
            by_key
                .values()
                .flatten()
                .map(move |t| (type_name.as_str(), t))
        })
    }

    /// `{ "<type>": { "<key>": [tokens…] } }` for clients.
    pub fn json(&self) -> serde_json::Value {
        let mut types = serde_json::Map::new();
        for (type_name, by_key) in &self.tokens {
            let mut keys = serde_json::Map::new();
            for (key, tokens) in by_key {
                keys.insert(
                    key.to_string(),
                    serde_json::Value::Array(tokens.iter().map(ErrorToken::json).collect()),
                );
            }
            types.insert(type_name.clone(), serde_json::Value::Object(keys));
        }
        serde_json::Value::Object(types)
    }

    /// Fail with the collected tokens if any rule failed.
    pub fn into_result(self) -> crate::Result<()> {
        if self.has_error() {
            Err(crate::Error::ValidationFailed(self))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for ErrorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} token(s): {}", self.token_count(), self.json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_dedups_identical_tokens() {
        let mut buf = ErrorBuffer::new();
        buf.add("Page", ErrorToken::EmptyOrBlank { key: "name" });
        buf.add("Page", ErrorToken::EmptyOrBlank { key: "name" });
        assert_eq!(buf.token_count(), 1);
    }

    #[test]
    fn test_json_shape() {
        let mut buf = ErrorBuffer::new();
        buf.add(
            "Page",
            ErrorToken::ChronologicalOrder {
                first: "visibilityStartDate",
                second: "visibilityEndDate",
            },
        );
        let rendered = buf.json();
        assert_eq!(
            rendered["Page"]["visibilityStartDate"][0]["must_lie_before"],
            serde_json::json!("visibilityEndDate")
        );
    }

    #[test]
    fn test_status_picks_worst() {
        let mut buf = ErrorBuffer::new();
        buf.add("Page", ErrorToken::EmptyOrBlank { key: "name" });
        assert_eq!(buf.status(), 422);
        buf.add("Page", ErrorToken::IdNotFound { id: "x".into() });
        assert_eq!(buf.status(), 404);
    }

    #[test]
    fn test_into_result() {
        assert!(ErrorBuffer::new().into_result().is_ok());
        let mut buf = ErrorBuffer::new();
        buf.add("Page", ErrorToken::EmptyOrBlank { key: "name" });
        assert!(buf.into_result().is_err());
    }
}
