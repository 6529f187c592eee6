//! Append-only run history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a run's append-only history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Entity kind: `"workflow"` or `"node"`.
    pub kind: String,
    /// Entity identifier (run id or node key).
    pub entity: String,
    /// The action that occurred.
    pub action: String,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl HistoryEntry {
    /// Record an action now.
    #[must_use]
    pub fn now(
        kind: &str,
        entity: impl Into<String>,
        action: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: kind.to_string(),
            entity: entity.into(),
            action: action.into(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_records_fields() {
        let entry = HistoryEntry::now(
            "node",
            "n1",
            "completed",
            Some(serde_json::json!({"attempt": 1})),
        );
        assert_eq!(entry.kind, "node");
        assert_eq!(entry.entity, "n1");
        assert_eq!(entry.action, "completed");
        assert!(entry.details.is_some());
    }
}
