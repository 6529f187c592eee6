//! Execution errors.

use gantry_core::NodeKey;
use thiserror::Error;

/// Errors produced by the execution state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// An illegal state transition; fatal for the run.
    #[error("protocol violation: invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        /// `"workflow"` or `"node"`.
        entity: String,
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// A node key not present in the processed workflow.
    #[error("node not found in workflow: {0}")]
    NodeNotFound(NodeKey),

    /// A node was scheduled twice for the same attempt.
    #[error("node already scheduled: {0}")]
    AlreadyScheduled(NodeKey),

    /// The retry budget does not permit another attempt.
    #[error("retry budget exhausted for node {0}")]
    RetriesExhausted(NodeKey),

    /// A replayed event stream was malformed.
    #[error("replay: {0}")]
    Replay(String),
}
