//! The `delay` strategy: succeeds after a configured duration.

use std::time::Duration;

use async_trait::async_trait;
use gantry_workflow::NodeDefinition;
use serde_json::Value;

use crate::error::{StrategyError, ValidationReport};
use crate::strategy::{base_validation, Strategy};
use crate::view::RunView;

/// Sleeps for `duration_ms`, then passes the input through unchanged.
/// Cancellation interrupts the sleep immediately.
pub struct DelayStrategy;

fn duration_of(node: &NodeDefinition) -> Option<Duration> {
    node.config
        .get("duration_ms")
        .and_then(Value::as_u64)
        .map(Duration::from_millis)
}

#[async_trait]
impl Strategy for DelayStrategy {
    fn node_type(&self) -> &str {
        "delay"
    }

    fn validate(&self, node: &NodeDefinition) -> ValidationReport {
        let mut report = base_validation(node);
        if duration_of(node).is_none() {
            report.error("duration_ms", "required non-negative integer of milliseconds");
        }
        report
    }

    async fn execute(
        &self,
        view: &RunView,
        node: &NodeDefinition,
    ) -> Result<Value, StrategyError> {
        let duration = duration_of(node)
            .ok_or_else(|| StrategyError::permanent("delay: duration_ms missing"))?;

        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(view.input.clone()),
            () = view.cancelled() => Err(StrategyError::permanent("delay cancelled")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::{ExecutionId, NodeKey, TenantId, WorkflowId};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn view(token: CancellationToken) -> RunView {
        RunView {
            tenant_id: TenantId::v4(),
            workflow_id: WorkflowId::v4(),
            execution_id: ExecutionId::v4(),
            node: NodeKey::new("wait").unwrap(),
            attempt: 1,
            input: json!({"carried": true}),
            variables: serde_json::Map::new(),
            cancellation: token,
        }
    }

    fn node(ms: u64) -> NodeDefinition {
        NodeDefinition::new(NodeKey::new("wait").unwrap(), "delay", "Wait")
            .with_config("duration_ms", json!(ms))
    }

    #[tokio::test(start_paused = true)]
    async fn passes_input_through_after_the_delay() {
        let out = DelayStrategy
            .execute(&view(CancellationToken::new()), &node(60_000))
            .await
            .unwrap();
        assert_eq!(out, json!({"carried": true}));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_sleep() {
        let token = CancellationToken::new();
        let view = view(token.clone());
        let handle = tokio::spawn(async move {
            DelayStrategy.execute(&view, &node(60_000)).await
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();

        let result = handle.await.unwrap();
        let err = result.unwrap_err();
        assert!(err.message.contains("cancelled"));
        assert!(!err.retryable);
    }

    #[test]
    fn validation_requires_duration() {
        let bare = NodeDefinition::new(NodeKey::new("wait").unwrap(), "delay", "Wait");
        assert_eq!(DelayStrategy.validate(&bare).errors[0].field, "duration_ms");
        assert!(DelayStrategy.validate(&node(5)).is_ok());
    }
}
