//! The `decision` strategy: evaluates an expression to a discrete label.

use async_trait::async_trait;
use gantry_expression::{evaluate, EvalContext};
use gantry_workflow::NodeDefinition;
use serde_json::Value;

use crate::error::{StrategyError, ValidationReport};
use crate::strategy::{base_validation, config_str, Strategy};
use crate::view::RunView;

/// Evaluates the configured expression against the node's input; the
/// output is a discrete label the engine matches edge conditions against.
pub struct DecisionStrategy;

#[async_trait]
impl Strategy for DecisionStrategy {
    fn node_type(&self) -> &str {
        "decision"
    }

    fn validate(&self, node: &NodeDefinition) -> ValidationReport {
        let mut report = base_validation(node);
        if config_str(node, "expression").is_none() {
            report.error("expression", "required expression string");
        }
        report
    }

    async fn execute(
        &self,
        view: &RunView,
        node: &NodeDefinition,
    ) -> Result<Value, StrategyError> {
        let expression = config_str(node, "expression")
            .ok_or_else(|| StrategyError::permanent("decision: expression missing"))?;
        let context = EvalContext::new()
            .with("data", view.input.clone())
            .with("input", view.input.clone())
            .with("variables", Value::Object(view.variables.clone()));
        evaluate(expression, &context).map_err(|e| StrategyError::permanent(e.to_string()))
    }
}
