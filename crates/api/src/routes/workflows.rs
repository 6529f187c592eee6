//! Workflow definition routes.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use gantry_core::WorkflowId;
use gantry_storage::ExecutionRecordRow;
use gantry_workflow::{Edge, NodeDefinition, ProcessedWorkflow, WorkflowDefinition, WorkflowStatus};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::{tenant_from_headers, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
    nodes: Vec<NodeDefinition>,
    edges: Vec<Edge>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkflowBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    nodes: Option<Vec<NodeDefinition>>,
    #[serde(default)]
    edges: Option<Vec<Edge>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Validate the graph shape and every node's strategy config.
fn validate_definition(
    state: &AppState,
    nodes: &[NodeDefinition],
    edges: &[Edge],
) -> Result<(), ApiError> {
    ProcessedWorkflow::process(nodes.to_vec(), edges.to_vec())
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    for node in nodes {
        let strategy = state
            .strategies
            .get(&node.node_type)
            .ok_or_else(|| ApiError::Validation(format!("unknown node type {:?}", node.node_type)))?;
        let report = strategy.validate(node);
        if !report.is_ok() {
            let detail: Vec<String> = report
                .errors
                .iter()
                .map(|e| format!("{}: {} ({})", node.id, e.field, e.message))
                .collect();
            return Err(ApiError::Validation(detail.join("; ")));
        }
    }
    Ok(())
}

/// `POST /workflows`
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateWorkflowBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    validate_definition(&state, &body.nodes, &body.edges)?;

    let mut workflow = WorkflowDefinition::new(tenant, body.name, body.nodes, body.edges);
    workflow.description = body.description;
    workflow.tags = body.tags;
    let id = workflow.id;
    state.workflows.create(workflow).await?;
    Ok(Json(serde_json::json!({"id": id})))
}

/// `PUT /workflows/{id}` — partial update; bumps the version.
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<WorkflowId>,
    Json(body): Json<UpdateWorkflowBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let mut workflow = state.workflows.get(tenant, id).await?;

    if let Some(name) = body.name {
        workflow.name = name;
    }
    if body.description.is_some() {
        workflow.description = body.description;
    }
    if let Some(nodes) = body.nodes {
        workflow.nodes = nodes;
    }
    if let Some(edges) = body.edges {
        workflow.edges = edges;
    }
    if let Some(tags) = body.tags {
        workflow.tags = tags;
    }
    validate_definition(&state, &workflow.nodes, &workflow.edges)?;

    workflow.version += 1;
    workflow.updated_at = Utc::now();
    let version = workflow.version;
    state.workflows.update(workflow).await?;
    Ok(Json(serde_json::json!({"id": id, "version": version})))
}

/// `POST /workflows/{id}/publish`
pub async fn publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<WorkflowId>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    let mut workflow = state.workflows.get(tenant, id).await?;
    if workflow.status == WorkflowStatus::Published {
        return Err(ApiError::Conflict("workflow is already published".into()));
    }
    if workflow.status == WorkflowStatus::Archived {
        return Err(ApiError::Conflict("archived workflows cannot be published".into()));
    }
    workflow.status = WorkflowStatus::Published;
    workflow.updated_at = Utc::now();
    state.workflows.update(workflow).await?;
    Ok(Json(serde_json::json!({"id": id, "status": "published"})))
}

/// `GET /workflows/{id}/executions`
pub async fn list_executions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<WorkflowId>,
) -> Result<Json<Vec<ExecutionRecordRow>>, ApiError> {
    let tenant = tenant_from_headers(&headers)?;
    // 404 on an unknown workflow, not an empty list.
    state.workflows.get(tenant, id).await?;
    let rows = state.executions.list_by_workflow(tenant, id).await?;
    Ok(Json(rows))
}
