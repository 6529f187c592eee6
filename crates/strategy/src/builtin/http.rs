//! The `http` strategy.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use gantry_workflow::NodeDefinition;
use serde_json::Value;

use crate::error::{StrategyError, ValidationReport};
use crate::strategy::{base_validation, config_str, Strategy};
use crate::view::RunView;

const SUPPORTED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs an HTTP request built from the node's `{url, method, headers,
/// body}` template with the resolved input merged in.
///
/// A response is a success iff `200 <= status < 300`; the output is
/// `{status_code, headers, body}` where the body is parsed as JSON when
/// the content type says so and kept as raw text otherwise. Transport
/// errors and 5xx responses are retryable; 4xx responses are not.
pub struct HttpStrategy {
    client: reqwest::Client,
}

impl HttpStrategy {
    /// Create the strategy with a dedicated client.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge the resolved input over the configured body template. Two
/// objects merge key-by-key (input wins); otherwise a non-null input
/// replaces the template wholesale.
fn merge_body(template: Option<&Value>, input: &Value) -> Option<Value> {
    match (template, input) {
        (Some(Value::Object(base)), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (k, v) in overlay {
                merged.insert(k.clone(), v.clone());
            }
            Some(Value::Object(merged))
        }
        (_, Value::Null) => template.cloned(),
        (None, input) => Some(input.clone()),
        (Some(_), input) => Some(input.clone()),
    }
}

#[async_trait]
impl Strategy for HttpStrategy {
    fn node_type(&self) -> &str {
        "http"
    }

    fn validate(&self, node: &NodeDefinition) -> ValidationReport {
        let mut report = base_validation(node);
        match config_str(node, "url") {
            None => report.error("url", "required"),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                report.error("url", "must be an absolute http(s) URL");
            }
            Some(_) => {}
        }
        if let Some(method) = config_str(node, "method") {
            if !SUPPORTED_METHODS.contains(&method.to_ascii_uppercase().as_str()) {
                report.error("method", format!("unsupported method {method:?}"));
            }
        }
        if let Some(headers) = node.config.get("headers") {
            if !headers.is_object() {
                report.error("headers", "must be an object of string values");
            }
        }
        report
    }

    async fn execute(
        &self,
        view: &RunView,
        node: &NodeDefinition,
    ) -> Result<Value, StrategyError> {
        let url = config_str(node, "url")
            .ok_or_else(|| StrategyError::permanent("http: url missing"))?;
        let method = config_str(node, "method").unwrap_or("GET").to_ascii_uppercase();
        let method: reqwest::Method = method
            .parse()
            .map_err(|_| StrategyError::permanent(format!("http: bad method {method:?}")))?;

        let mut request = self.client.request(method.clone(), url);
        if let Some(Value::Object(headers)) = node.config.get("headers") {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }
        if method != reqwest::Method::GET {
            if let Some(body) = merge_body(node.config.get("body"), &view.input) {
                request = request.json(&body);
            }
        }

        let response = tokio::select! {
            result = request.send() => result.map_err(|e| {
                // Transport-level failure: DNS, refused, reset, timeout.
                StrategyError::retryable(format!("http: request failed: {e}"))
            })?,
            () = view.cancelled() => {
                return Err(StrategyError::permanent("http: cancelled"));
            }
        };

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let is_json = headers
            .get("content-type")
            .is_some_and(|ct| ct.contains("application/json"));

        let text = response
            .text()
            .await
            .map_err(|e| StrategyError::retryable(format!("http: body read failed: {e}")))?;
        let body = if is_json {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };

        let output = serde_json::json!({
            "status_code": status.as_u16(),
            "headers": headers,
            "body": body,
        });

        if status.is_success() {
            Ok(output)
        } else if status.is_server_error() {
            Err(StrategyError::retryable(format!(
                "http: upstream returned {status}"
            )))
        } else {
            Err(StrategyError::permanent(format!(
                "http: upstream returned {status}"
            )))
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
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn view(input: Value) -> RunView {
        RunView {
            tenant_id: TenantId::v4(),
            workflow_id: WorkflowId::v4(),
            execution_id: ExecutionId::v4(),
            node: NodeKey::new("fetch").unwrap(),
            attempt: 1,
            input,
            variables: serde_json::Map::new(),
            cancellation: CancellationToken::new(),
        }
    }

    fn node(url: &str, http_method: &str) -> NodeDefinition {
        NodeDefinition::new(NodeKey::new("fetch").unwrap(), "http", "Fetch")
            .with_config("url", json!(url))
            .with_config("method", json!(http_method))
    }

    #[tokio::test]
    async fn success_parses_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let out = HttpStrategy::new()
            .execute(&view(Value::Null), &node(&format!("{}/data", server.uri()), "GET"))
            .await
            .unwrap();

        assert_eq!(out["status_code"], json!(200));
        assert_eq!(out["body"], json!({"ok": true}));
    }

    #[tokio::test]
    async fn non_json_body_stays_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain text"))
            .mount(&server)
            .await;

        let out = HttpStrategy::new()
            .execute(&view(Value::Null), &node(&server.uri(), "GET"))
            .await
            .unwrap();
        assert_eq!(out["body"], json!("plain text"));
    }

    #[tokio::test]
    async fn input_merges_over_body_template() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"fixed": 1, "v": 3})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
            .mount(&server)
            .await;

        let node = node(&server.uri(), "POST").with_config("body", json!({"fixed": 1}));
        let out = HttpStrategy::new()
            .execute(&view(json!({"v": 3})), &node)
            .await
            .unwrap();
        assert_eq!(out["status_code"], json!(201));
    }

    #[tokio::test]
    async fn server_errors_are_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = HttpStrategy::new()
            .execute(&view(Value::Null), &node(&server.uri(), "GET"))
            .await
            .unwrap_err();
        assert!(err.retryable);
        assert!(err.message.contains("500"));
    }

    #[tokio::test]
    async fn client_errors_are_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = HttpStrategy::new()
            .execute(&view(Value::Null), &node(&server.uri(), "GET"))
            .await
            .unwrap_err();
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn connection_failure_is_retryable() {
        // Nothing listens on this port.
        let err = HttpStrategy::new()
            .execute(&view(Value::Null), &node("http://127.0.0.1:9", "GET"))
            .await
            .unwrap_err();
        assert!(err.retryable);
    }

    #[test]
    fn validation_checks_url_and_method() {
        let bare = NodeDefinition::new(NodeKey::new("fetch").unwrap(), "http", "Fetch");
        assert_eq!(HttpStrategy::new().validate(&bare).errors[0].field, "url");

        let relative = node("/relative", "GET");
        assert!(!HttpStrategy::new().validate(&relative).is_ok());

        let bad_method = node("https://example.com", "BREW");
        let report = HttpStrategy::new().validate(&bad_method);
        assert_eq!(report.errors[0].field, "method");

        assert!(HttpStrategy::new().validate(&node("https://example.com", "get")).is_ok());
    }

    #[test]
    fn merge_body_semantics() {
        assert_eq!(
            merge_body(Some(&json!({"a": 1, "b": 2})), &json!({"b": 3})),
            Some(json!({"a": 1, "b": 3}))
        );
        assert_eq!(merge_body(None, &json!([1])), Some(json!([1])));
        assert_eq!(merge_body(Some(&json!({"a": 1})), &Value::Null), Some(json!({"a": 1})));
        assert_eq!(merge_body(None, &Value::Null), None);
    }
}
