//! Tree address codec.
//!
//! A tree address names a position in an ordered subtree relative to a
//! context root: the context id followed by one `_<position>` suffix per
//! level of depth, e.g. `CTX_3_0` — under context `CTX`, position 3 at
//! the first level, then position 0 at the second.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::{Error, Result};

/// The wildcard context key: a position that applies under any context.
pub const WILDCARD: &str = "*";

/// Is `key` a context id or tree address? Context ids are 32-char
/// alphanumeric strings; an address is one with `_<position>` suffixes.
pub fn is_tree_address(key: &str) -> bool {
    let head = key.split('_').next().unwrap_or("");
    head.len() == 32 && head.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Is `key` an attribute the tree encoder owns — a context position entry?
pub fn is_context_key(key: &str) -> bool {
    key == WILDCARD || is_tree_address(key)
}

/// The context id of an address key (everything before the first `_`).
pub fn context_of(key: &str) -> &str {
    key.split('_').next().unwrap_or(key)
}

// ============================================================================
// TreeAddress
// ============================================================================

/// Parsed form of a tree address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeAddress {
    context: String,
    positions: SmallVec<[i64; 4]>,
}

impl TreeAddress {
    /// An address at the context root (no position suffixes).
    pub fn root(context: impl Into<String>) -> Self {
        Self { context: context.into(), positions: SmallVec::new() }
    }

    pub fn context_id(&self) -> &str {
        &self.context
    }

    pub fn positions(&self) -> &[i64] {
        &self.positions
    }

    pub fn depth(&self) -> usize {
        self.positions.len()
    }

    /// The parent address, or None at the context root.
    pub fn parent(&self) -> Option<TreeAddress> {
        if self.positions.is_empty() {
            return None;
        }
        let mut positions = self.positions.clone();
        positions.pop();
        Some(Self { context: self.context.clone(), positions })
    }

    /// Descend one level: the address of the child at `position`.
    pub fn expand(&self, position: i64) -> TreeAddress {
        let mut positions = self.positions.clone();
        positions.push(position);
        Self { context: self.context.clone(), positions }
    }
}

impl fmt::Display for TreeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.context)?;
        for pos in &self.positions {
            write!(f, "_{pos}")?;
        }
        Ok(())
    }
}

impl FromStr for TreeAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('_');
        let context = parts.next().unwrap_or("").to_string();
        if context.is_empty() {
            return Err(Error::MalformedPosition {
                key: s.to_string(),
                detail: "empty context id".into(),
            });
        }
        let mut positions = SmallVec::new();
        for part in parts {
            let pos: i64 = part.parse().map_err(|_| Error::MalformedPosition {
                key: s.to_string(),
                detail: format!("'{part}' is not a position"),
            })?;
            positions.push(pos);
        }
        Ok(Self { context, positions })
    }
}

// ============================================================================
// Tests
// ============================================================================
