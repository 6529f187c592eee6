//! The `webhook` sink strategy.

use async_trait::async_trait;
use gantry_workflow::NodeDefinition;
use serde_json::Value;

use crate::error::{StrategyError, ValidationReport};
use crate::strategy::{base_validation, Strategy};
use crate::view::RunView;

/// Returns its input unchanged; a terminal mark for external delivery.
/// The actual outbound transport lives behind the ingress layer.
pub struct WebhookSinkStrategy;

#[async_trait]
impl Strategy for WebhookSinkStrategy {
    fn node_type(&self) -> &str {
        "webhook"
    }

    fn validate(&self, node: &NodeDefinition) -> ValidationReport {
        base_validation(node)
    }

    async fn execute(
        &self,
        view: &RunView,
        _node: &NodeDefinition,
    ) -> Result<Value, StrategyError> {
        Ok(view.input.clone())
    }
}
