//! Engine errors.

use gantry_core::{ExecutionId, NodeKey};
use thiserror::Error;

/// Errors surfaced by the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No published workflow contains the triggered node.
    #[error("no published workflow contains node {0}")]
    NoWorkflowForNode(NodeKey),

    /// A node type has no registered strategy.
    #[error("no strategy registered for node type {0:?}")]
    UnknownNodeType(String),

    /// The referenced run is not live on this engine.
    #[error("run not found: {0}")]
    RunNotFound(ExecutionId),

    /// Graph processing rejected the stored definition.
    #[error(transparent)]
    Graph(#[from] gantry_workflow::WorkflowError),

    /// A state machine transition was rejected.
    #[error(transparent)]
    Execution(#[from] gantry_execution::ExecutionError),

    /// The event store refused an append.
    #[error(transparent)]
    Events(#[from] gantry_events::EventStoreError),

    /// A repository operation failed.
    #[error(transparent)]
    Storage(#[from] gantry_storage::StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = EngineError::NoWorkflowForNode(NodeKey::new("n1").unwrap());
        assert!(err.to_string().contains("n1"));

        let err = EngineError::UnknownNodeType("teleport".into());
        assert!(err.to_string().contains("teleport"));
    }
}
