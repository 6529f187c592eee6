//! Row shapes mirroring the persisted layout.

use chrono::{DateTime, Utc};
use gantry_core::{ExecutionId, NodeKey, TenantId, WorkflowId};
use gantry_execution::{Context, ExecutionStatus};
use gantry_workflow::NodeState;
use serde::{Deserialize, Serialize};

/// A `workflow_executions` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecordRow {
    /// Run id.
    pub id: ExecutionId,
    /// The workflow.
    pub workflow_id: WorkflowId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Run state.
    pub state: ExecutionStatus,
    /// Trigger metadata (trigger id, variables).
    pub metadata: serde_json::Value,
    /// Final variables snapshot once terminal.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Run error, if failed.
    #[serde(default)]
    pub error: Option<String>,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Last persistence time.
    pub updated_at: DateTime<Utc>,
}

/// A `node_executions` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecutionRow {
    /// Owning run.
    pub execution_id: ExecutionId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The node.
    pub node: NodeKey,
    /// Node state.
    pub state: NodeState,
    /// Resolved input.
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    /// Output, once completed.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// Error of the last failed attempt.
    #[serde(default)]
    pub error: Option<String>,
    /// Retries performed.
    pub retry_count: u32,
    /// When the node first started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the node settled.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Last persistence time.
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecordRow {
    /// Snapshot a live context into its row shape.
    #[must_use]
    pub fn from_context(ctx: &Context) -> Self {
        Self {
            id: ctx.execution_id,
            workflow_id: ctx.workflow_id,
            tenant_id: ctx.tenant_id,
            state: ctx.state,
            metadata: serde_json::json!({"trigger_id": ctx.trigger_id}),
            result: ctx
                .state
                .is_terminal()
                .then(|| serde_json::Value::Object(ctx.variables.clone())),
            error: ctx.error.clone(),
            started_at: ctx.started_at,
            completed_at: ctx.ended_at,
            updated_at: Utc::now(),
        }
    }
}

impl NodeExecutionRow {
    /// Snapshot every node record of a live context.
    #[must_use]
    pub fn from_context(ctx: &Context) -> Vec<Self> {
        let now = Utc::now();
        let mut rows: Vec<Self> = ctx
            .node_records()
            .iter()
            .map(|(node, record)| Self {
                execution_id: ctx.execution_id,
                tenant_id: ctx.tenant_id,
                node: node.clone(),
                state: record.state,
                input: record.input.clone(),
                output: record.output.clone(),
                error: record.error.clone(),
                retry_count: record.retry_count,
                started_at: record.started_at,
                completed_at: record.ended_at,
                updated_at: now,
            })
            .collect();
        rows.sort_by(|a, b| a.node.cmp(&b.node));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::TriggerId;
    use gantry_execution::RunConfig;
    use gantry_workflow::{NodeDefinition, ProcessedWorkflow};
    use std::sync::Arc;

    fn context() -> Context {
        let node = NodeDefinition::new(NodeKey::new("n1").unwrap(), "transform", "n1");
        let processed = Arc::new(ProcessedWorkflow::process(vec![node], vec![]).unwrap());
        Context::new(
            TenantId::v4(),
            WorkflowId::v4(),
            TriggerId::v4(),
            processed,
            serde_json::Map::new(),
            RunConfig::default(),
        )
    }

    #[test]
    fn execution_row_snapshots_context() {
        let mut ctx = context();
        ctx.start().unwrap();
        let row = ExecutionRecordRow::from_context(&ctx);
        assert_eq!(row.id, ctx.execution_id);
        assert_eq!(row.state, ExecutionStatus::Running);
        assert!(row.result.is_none(), "result only on terminal states");
        assert!(row.completed_at.is_none());
    }

    #[test]
    fn node_rows_snapshot_records() {
        let mut ctx = context();
        ctx.start().unwrap();
        let key = NodeKey::new("n1").unwrap();
        ctx.schedule_node(&key).unwrap();
        ctx.start_node(&key, serde_json::json!({"v": 1})).unwrap();
        ctx.complete_node(&key, serde_json::json!(2), serde_json::Map::new())
            .unwrap();

        let rows = NodeExecutionRow::from_context(&ctx);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state, NodeState::Completed);
        assert_eq!(rows[0].output, Some(serde_json::json!(2)));
    }
}
