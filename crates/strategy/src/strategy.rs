//! The strategy contract.

use async_trait::async_trait;
use gantry_workflow::NodeDefinition;

use crate::error::{StrategyError, ValidationReport};
use crate::view::RunView;

/// Per-node-type execution behavior.
///
/// Object-safe; the engine stores strategies as `Arc<dyn Strategy>` in the
/// registry and shares them across concurrent runs.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// The node type tag this strategy handles.
    fn node_type(&self) -> &str;

    /// Validate a node's configuration. Pure: no I/O, no clock.
    ///
    /// Implementations should start from [`base_validation`] and add
    /// type-specific checks.
    fn validate(&self, node: &NodeDefinition) -> ValidationReport;

    /// Execute the node against its resolved input.
    ///
    /// May suspend arbitrarily long but must honor
    /// [`RunView::cancellation`] promptly.
    async fn execute(
        &self,
        view: &RunView,
        node: &NodeDefinition,
    ) -> Result<serde_json::Value, StrategyError>;

    /// Best-effort teardown; invoked on every exit path from `execute`,
    /// including failure and cancellation. Must not propagate errors.
    async fn cleanup(&self, _view: &RunView, _node: &NodeDefinition) {}
}

/// The default checks every node type shares: `id`, `type`, and `name`
/// must be present and non-empty. (`id` is structurally guaranteed by
/// [`gantry_core::NodeKey`].)
#[must_use]
pub fn base_validation(node: &NodeDefinition) -> ValidationReport {
    let mut report = ValidationReport::ok();
    if node.node_type.trim().is_empty() {
        report.error("type", "node type must not be empty");
    }
    if node.name.trim().is_empty() {
        report.error("name", "node name must not be empty");
    }
    report
}

/// Fetch a required string field from a node's config.
pub(crate) fn config_str<'a>(node: &'a NodeDefinition, field: &str) -> Option<&'a str> {
    node.config.get(field).and_then(serde_json::Value::as_str)
}
