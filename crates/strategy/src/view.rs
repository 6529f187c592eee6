//! Read-only run view handed to strategies.

use gantry_core::{ExecutionId, NodeKey, TenantId, WorkflowId};
use tokio_util::sync::CancellationToken;

/// An immutable snapshot of the run, scoped to one node attempt.
///
/// Strategies read their resolved input and the run variables from here;
/// the only write path back into the run is the node's declared
/// `output_mapping`, which the engine applies after `execute` succeeds.
#[derive(Debug, Clone)]
pub struct RunView {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The workflow being run.
    pub workflow_id: WorkflowId,
    /// The run.
    pub execution_id: ExecutionId,
    /// The node being executed.
    pub node: NodeKey,
    /// 1-based attempt number.
    pub attempt: u32,
    /// The node's resolved input.
    pub input: serde_json::Value,
    /// Snapshot of the run variables at resolution time.
    pub variables: serde_json::Map<String, serde_json::Value>,
    /// Cooperative cancellation signal for this run.
    pub cancellation: CancellationToken,
}

impl RunView {
    /// Returns `true` if the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Await cancellation; used inside `tokio::select!` by suspending
    /// strategies.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_observable() {
        let view = RunView {
            tenant_id: TenantId::v4(),
            workflow_id: WorkflowId::v4(),
            execution_id: ExecutionId::v4(),
            node: NodeKey::new("n1").unwrap(),
            attempt: 1,
            input: serde_json::json!({}),
            variables: serde_json::Map::new(),
            cancellation: CancellationToken::new(),
        };
        assert!(!view.is_cancelled());
        view.cancellation.cancel();
        assert!(view.is_cancelled());
    }
}
