//! Node execution attempt tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single attempt to execute a node. Attempt numbers are 1-based and
/// totally ordered within a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAttempt {
    /// Which attempt this is (1-based).
    pub attempt_number: u32,
    /// When this attempt started.
    pub started_at: DateTime<Utc>,
    /// When this attempt finished, if it has.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Output if the attempt succeeded.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Error message if the attempt failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl NodeAttempt {
    /// Create an attempt that has just started.
    #[must_use]
    pub fn new(attempt_number: u32) -> Self {
        Self {
            attempt_number,
            started_at: Utc::now(),
            completed_at: None,
            output: None,
            error: None,
        }
    }

    /// Mark this attempt successfully completed.
    pub fn complete_success(&mut self, output: serde_json::Value) {
        self.completed_at = Some(Utc::now());
        self.output = Some(output);
    }

    /// Mark this attempt failed.
    pub fn complete_failure(&mut self, error: impl Into<String>) {
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    /// Returns `true` if the attempt has finished either way.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Returns `true` if the attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.output.is_some() && self.error.is_none()
    }

    /// Wall-clock duration of the attempt, once finished.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at
            .map(|end| (end - self.started_at).to_std().unwrap_or(Duration::ZERO))
    }
}
