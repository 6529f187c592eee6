//! Per-node lifecycle states.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a single node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Scheduled (or awaiting scheduling) but not yet started.
    #[default]
    Pending,
    /// A strategy is currently executing this node.
    Running,
    /// The node finished successfully.
    Completed,
    /// The node failed and its retry budget is exhausted.
    Failed,
    /// Every incoming edge was suppressed; the node never ran.
    Skipped,
    /// The run was cancelled while this node was pending or running.
    Cancelled,
}

impl NodeState {
    /// Returns `true` if the node has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// Returns `true` if the node counts toward the termination predicate's
    /// "settled" set (completed or skipped).
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
