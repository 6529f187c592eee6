//! Author-assigned node keys.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a node key in bytes.
const MAX_KEY_LEN: usize = 128;

/// Errors produced when parsing a [`NodeKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeKeyError {
    /// The key was empty.
    #[error("node key must not be empty")]
    Empty,

    /// The key exceeded the maximum length.
    #[error("node key exceeds {MAX_KEY_LEN} bytes: {0}")]
    TooLong(String),

    /// The key contained a character outside `[A-Za-z0-9_.-]`.
    #[error("node key contains invalid character {1:?}: {0}")]
    InvalidCharacter(String, char),
}

/// An author-assigned node identifier, unique within a workflow.
///
/// Keys are opaque strings restricted to `[A-Za-z0-9_.-]` and at most 128
/// bytes, so they can appear verbatim in URLs, queue lane payloads, and
/// event metadata without escaping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeKey(String);

impl NodeKey {
    /// Parse and validate a node key.
    pub fn new(key: impl Into<String>) -> Result<Self, NodeKeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(NodeKeyError::Empty);
        }
        if key.len() > MAX_KEY_LEN {
            return Err(NodeKeyError::TooLong(key));
        }
        if let Some(bad) = key
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        {
            return Err(NodeKeyError::InvalidCharacter(key, bad));
        }
        Ok(Self(key))
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for NodeKey {
    type Err = NodeKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeKey {
    type Error = NodeKeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<NodeKey> for String {
    fn from(key: NodeKey) -> Self {
        key.0
    }
}

impl std::borrow::Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys() {
        for key in ["n1", "fetch-user", "transform_2", "a.b.c", "X"] {
            assert!(NodeKey::new(key).is_ok(), "expected {key:?} to parse");
        }
    }

    #[test]
    fn empty_key_rejected() {
        assert_eq!(NodeKey::new(""), Err(NodeKeyError::Empty));
    }

    #[test]
    fn overlong_key_rejected() {
        let long = "x".repeat(129);
        assert!(matches!(NodeKey::new(long), Err(NodeKeyError::TooLong(_))));
    }

    #[test]
    fn invalid_character_rejected() {
        let err = NodeKey::new("a b").unwrap_err();
        assert!(matches!(err, NodeKeyError::InvalidCharacter(_, ' ')));
        assert!(NodeKey::new("a/b").is_err());
        assert!(NodeKey::new("ключ").is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let key = NodeKey::new("fetch-user").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"fetch-user\"");
        let back: NodeKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }

    #[test]
    fn serde_rejects_invalid() {
        let result: Result<NodeKey, _> = serde_json::from_str("\"has space\"");
        assert!(result.is_err());
    }

    #[test]
    fn borrow_allows_str_lookup() {
        use std::collections::HashMap;

        let mut map: HashMap<NodeKey, u32> = HashMap::new();
        map.insert(NodeKey::new("n1").unwrap(), 1);
        assert_eq!(map.get("n1"), Some(&1));
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = NodeKey::new("a").unwrap();
        let b = NodeKey::new("b").unwrap();
        assert!(a < b);
    }
}
