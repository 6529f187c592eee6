//! The `agent` strategy.

use std::time::Duration;

use async_trait::async_trait;
use gantry_workflow::NodeDefinition;
use serde_json::Value;

use crate::error::{StrategyError, ValidationReport};
use crate::strategy::{base_validation, config_str, Strategy};
use crate::view::RunView;

/// Agent calls routinely run for minutes.
const AGENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Posts the resolved input to a configured agent endpoint and relays the
/// reply. Opaque to the core: an execution may last seconds to minutes,
/// so cancellation is checked throughout.
pub struct AgentStrategy {
    client: reqwest::Client,
}

impl AgentStrategy {
    /// Create the strategy with a long-timeout client.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(AGENT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for AgentStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for AgentStrategy {
    fn node_type(&self) -> &str {
        "agent"
    }

    fn validate(&self, node: &NodeDefinition) -> ValidationReport {
        let mut report = base_validation(node);
        match config_str(node, "endpoint") {
            None => report.error("endpoint", "required"),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                report.error("endpoint", "must be an absolute http(s) URL");
            }
            Some(_) => {}
        }
        report
    }

    async fn execute(
        &self,
        view: &RunView,
        node: &NodeDefinition,
    ) -> Result<Value, StrategyError> {
        let endpoint = config_str(node, "endpoint")
            .ok_or_else(|| StrategyError::permanent("agent: endpoint missing"))?;

        let request = self.client.post(endpoint).json(&serde_json::json!({
            "execution_id": view.execution_id,
            "node": view.node,
            "input": view.input,
        }));

        let response = tokio::select! {
            result = request.send() => result.map_err(|e| {
                StrategyError::retryable(format!("agent: request failed: {e}"))
            })?,
            () = view.cancelled() => {
                return Err(StrategyError::permanent("agent: cancelled"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let err = format!("agent: upstream returned {status}");
            return if status.is_server_error() {
                Err(StrategyError::retryable(err))
            } else {
                Err(StrategyError::permanent(err))
            };
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| StrategyError::permanent(format!("agent: non-JSON reply: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::{ExecutionId, NodeKey, TenantId, WorkflowId};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn view(input: Value) -> RunView {
        RunView {
            tenant_id: TenantId::v4(),
            workflow_id: WorkflowId::v4(),
            execution_id: ExecutionId::v4(),
            node: NodeKey::new("assistant").unwrap(),
            attempt: 1,
            input,
            variables: serde_json::Map::new(),
            cancellation: CancellationToken::new(),
        }
    }

    fn node(endpoint: &str) -> NodeDefinition {
        NodeDefinition::new(NodeKey::new("assistant").unwrap(), "agent", "Assistant")
            .with_config("endpoint", json!(endpoint))
    }

    #[tokio::test]
    async fn relays_the_agent_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"reply": "done"})),
            )
            .mount(&server)
            .await;

        let out = AgentStrategy::new()
            .execute(&view(json!({"q": "hi"})), &node(&format!("{}/run", server.uri())))
            .await
            .unwrap();
        assert_eq!(out, json!({"reply": "done"}));
    }

    #[tokio::test]
    async fn upstream_5xx_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = AgentStrategy::new()
            .execute(&view(Value::Null), &node(&server.uri()))
            .await
            .unwrap_err();
        assert!(err.retryable);
    }

    #[test]
    fn validation_requires_endpoint() {
        let bare = NodeDefinition::new(NodeKey::new("assistant").unwrap(), "agent", "Assistant");
        assert_eq!(AgentStrategy::new().validate(&bare).errors[0].field, "endpoint");
        assert!(AgentStrategy::new().validate(&node("https://agents.internal/run")).is_ok());
    }
}
