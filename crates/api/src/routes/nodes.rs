//! Node trigger and attempt-listing routes.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use gantry_core::{NodeKey, TriggerId};
use gantry_storage::NodeExecutionRow;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::{tenant_from_headers, AppState};

#[derive(Debug, Deserialize)]
pub struct TriggerBody {
    #[serde(default)]
    input: serde_json::Value,
    #[serde(default)]
    metadata: serde_json::Value,
    /// Optional idempotency key: the same trigger id produces one run.
    #[serde(default)]
    trigger_id: Option<TriggerId>,
}

/// `POST /nodes/{node_id}/trigger`
pub async fn trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(node_id): Path<String>,
    Json(body): Json<TriggerBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let node: NodeKey = node_id
        .parse()
        .map_err(|e| ApiError::Validation(format!("invalid node id: {e}")))?;

    let outcome = state
        .engine
        .trigger_node(tenant, node, body.input, body.metadata, body.trigger_id)
        .await?;

    Ok(Json(serde_json::json!({
        "trigger_id": outcome.trigger_id,
        "execution_id": outcome.execution_id,
        "deduplicated": outcome.deduplicated,
        "deferred": outcome.deferred,
    })))
}

/// `GET /nodes/{node_id}/executions`
pub async fn list_executions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(node_id): Path<String>,
) -> Result<Json<Vec<NodeExecutionRow>>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let node: NodeKey = node_id
        .parse()
        .map_err(|e| ApiError::Validation(format!("invalid node id: {e}")))?;
    let rows = state.executions.list_node_executions(tenant, &node).await?;
    Ok(Json(rows))
}
