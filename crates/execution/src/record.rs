//! Per-node run records.

use chrono::{DateTime, Utc};
use gantry_workflow::NodeState;
use serde::{Deserialize, Serialize};

use crate::attempt::NodeAttempt;

/// The execution record of a single node within a run.
///
/// Created on the node's first `schedule` (or `skip`) event and mutated
/// only through state machine transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRunRecord {
    /// Current lifecycle state.
    pub state: NodeState,
    /// When the node first started running.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the node reached a terminal state.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// The resolved input of the most recent attempt.
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    /// The output of the successful attempt, if any.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Error message of the most recent failed attempt.
    #[serde(default)]
    pub error: Option<String>,
    /// Number of retries performed (attempts minus one, once started).
    pub retry_count: u32,
    /// All attempts, ordered by attempt number.
    pub attempts: Vec<NodeAttempt>,
}

impl NodeRunRecord {
    /// A fresh record in the `Pending` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: NodeState::Pending,
            started_at: None,
            ended_at: None,
            input: None,
            output: None,
            error: None,
            retry_count: 0,
            attempts: Vec::new(),
        }
    }

    /// The in-progress or most recent attempt.
    #[must_use]
    pub fn latest_attempt(&self) -> Option<&NodeAttempt> {
        self.attempts.last()
    }

    /// Mutable access to the in-progress attempt.
    pub(crate) fn latest_attempt_mut(&mut self) -> Option<&mut NodeAttempt> {
        self.attempts.last_mut()
    }

    /// The attempt number the next `start` will carry (1-based).
    #[must_use]
    pub fn next_attempt_number(&self) -> u32 {
        self.retry_count + 1
    }
}

impl Default for NodeRunRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record() {
        let record = NodeRunRecord::new();
        assert_eq!(record.state, NodeState::Pending);
        assert_eq!(record.retry_count, 0);
        assert_eq!(record.next_attempt_number(), 1);
        assert!(record.latest_attempt().is_none());
    }

    #[test]
    fn attempt_numbering_follows_retries() {
        let mut record = NodeRunRecord::new();
        record.retry_count = 2;
        assert_eq!(record.next_attempt_number(), 3);
    }

    #[test]
    fn serde_roundtrip() {
        let mut record = NodeRunRecord::new();
        record.attempts.push(NodeAttempt::new(1));
        let json = serde_json::to_string(&record).unwrap();
        let back: NodeRunRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
