//! The `transform` strategy: map / filter / reduce over the expression
//! language.

use async_trait::async_trait;
use gantry_expression::{evaluate, evaluate_bool, EvalContext};
use gantry_workflow::NodeDefinition;
use serde_json::Value;

use crate::error::{StrategyError, ValidationReport};
use crate::strategy::{base_validation, config_str, Strategy};
use crate::view::RunView;

const MODES: [&str; 3] = ["map", "filter", "reduce"];

/// Applies the configured expression template to the node's input.
///
/// - `map` over a sequence applies the template to each element; over a
///   single value it applies once.
/// - `filter` retains elements whose template truth-evaluates to true.
/// - `reduce` threads an accumulator (bound as `acc`) seeded by
///   `initial_value`.
///
/// Transform errors are never retryable: the same input and template will
/// fail the same way again.
pub struct TransformStrategy;

impl TransformStrategy {
    fn context(view: &RunView, element: &Value) -> EvalContext {
        EvalContext::new()
            .with("data", element.clone())
            .with("input", view.input.clone())
            .with("variables", Value::Object(view.variables.clone()))
    }
}

#[async_trait]
impl Strategy for TransformStrategy {
    fn node_type(&self) -> &str {
        "transform"
    }

    fn validate(&self, node: &NodeDefinition) -> ValidationReport {
        let mut report = base_validation(node);
        match config_str(node, "transformation_type") {
            None => report.error("transformation_type", "required"),
            Some(mode) if !MODES.contains(&mode) => {
                report.error(
                    "transformation_type",
                    format!("must be one of map, filter, reduce; got {mode:?}"),
                );
            }
            Some(_) => {}
        }
        if config_str(node, "template").is_none() {
            report.error("template", "required expression string");
        }
        report
    }

    async fn execute(
        &self,
        view: &RunView,
        node: &NodeDefinition,
    ) -> Result<Value, StrategyError> {
        let mode = config_str(node, "transformation_type")
            .ok_or_else(|| StrategyError::permanent("transform: transformation_type missing"))?;
        let template = config_str(node, "template")
            .ok_or_else(|| StrategyError::permanent("transform: template missing"))?;

        let result = match mode {
            "map" => match &view.input {
                Value::Array(items) => {
                    let mut mapped = Vec::with_capacity(items.len());
                    for item in items {
                        mapped.push(
                            evaluate(template, &Self::context(view, item))
                                .map_err(|e| StrategyError::permanent(e.to_string()))?,
                        );
                    }
                    Value::Array(mapped)
                }
                single => evaluate(template, &Self::context(view, single))
                    .map_err(|e| StrategyError::permanent(e.to_string()))?,
            },
            "filter" => {
                let Value::Array(items) = &view.input else {
                    return Err(StrategyError::permanent(
                        "transform: filter requires a sequence input",
                    ));
                };
                let mut kept = Vec::new();
                for item in items {
                    if evaluate_bool(template, &Self::context(view, item))
                        .map_err(|e| StrategyError::permanent(e.to_string()))?
                    {
                        kept.push(item.clone());
                    }
                }
                Value::Array(kept)
            }
            "reduce" => {
                let Value::Array(items) = &view.input else {
                    return Err(StrategyError::permanent(
                        "transform: reduce requires a sequence input",
                    ));
                };
                let mut acc = node
                    .config
                    .get("initial_value")
                    .cloned()
                    .unwrap_or(Value::Null);
                for item in items {
                    let context = Self::context(view, item).with("acc", acc);
                    acc = evaluate(template, &context)
                        .map_err(|e| StrategyError::permanent(e.to_string()))?;
                }
                acc
            }
            other => {
                return Err(StrategyError::permanent(format!(
                    "transform: unknown transformation_type {other:?}"
                )));
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::{ExecutionId, NodeKey, TenantId, WorkflowId};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn view(input: Value) -> RunView {
        RunView {
            tenant_id: TenantId::v4(),
            workflow_id: WorkflowId::v4(),
            execution_id: ExecutionId::v4(),
            node: NodeKey::new("t").unwrap(),
            attempt: 1,
            input,
            variables: serde_json::Map::new(),
            cancellation: CancellationToken::new(),
        }
    }

    fn node(mode: &str, template: &str) -> NodeDefinition {
        NodeDefinition::new(NodeKey::new("t").unwrap(), "transform", "Transform")
            .with_config("transformation_type", json!(mode))
            .with_config("template", json!(template))
    }

    #[tokio::test]
    async fn map_single_value() {
        let out = TransformStrategy
            .execute(&view(json!({"v": 3})), &node("map", "data.v * 2"))
            .await
            .unwrap();
        assert_eq!(out, json!(6));
    }

    #[tokio::test]
    async fn map_sequence() {
        let out = TransformStrategy
            .execute(&view(json!([1, 2, 3])), &node("map", "data * 10"))
            .await
            .unwrap();
        assert_eq!(out, json!([10, 20, 30]));
    }

    #[tokio::test]
    async fn filter_sequence() {
        let out = TransformStrategy
            .execute(
                &view(json!([{"v": 1}, {"v": -2}, {"v": 3}])),
                &node("filter", "data.v > 0"),
            )
            .await
            .unwrap();
        assert_eq!(out, json!([{"v": 1}, {"v": 3}]));
    }

    #[tokio::test]
    async fn reduce_with_initial_value() {
        let node = node("reduce", "acc + data").with_config("initial_value", json!(100));
        let out = TransformStrategy
            .execute(&view(json!([1, 2, 3])), &node)
            .await
            .unwrap();
        assert_eq!(out, json!(106));
    }

    #[tokio::test]
    async fn filter_requires_sequence() {
        let err = TransformStrategy
            .execute(&view(json!(42)), &node("filter", "data > 0"))
            .await
            .unwrap_err();
        assert!(!err.retryable, "transform errors are never retryable");
        assert!(err.message.contains("sequence"));
    }

    #[tokio::test]
    async fn evaluation_errors_are_permanent() {
        let err = TransformStrategy
            .execute(&view(json!({"v": 3})), &node("map", "data.v +"))
            .await
            .unwrap_err();
        assert!(!err.retryable);
    }

    #[test]
    fn validation_flags_missing_config() {
        let bare = NodeDefinition::new(NodeKey::new("t").unwrap(), "transform", "T");
        let report = TransformStrategy.validate(&bare);
        let fields: Vec<&str> = report.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["transformation_type", "template"]);
    }

    #[test]
    fn validation_flags_unknown_mode() {
        let report = TransformStrategy.validate(&node("explode", "1"));
        assert!(!report.is_ok());
        assert!(report.errors[0].message.contains("explode"));
    }

    #[test]
    fn validation_accepts_all_modes() {
        for mode in MODES {
            assert!(TransformStrategy.validate(&node(mode, "data")).is_ok());
        }
    }
}
