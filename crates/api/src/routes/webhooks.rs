//! Inbound webhook route: challenge handshakes, signature verification,
//! and trigger synthesis.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gantry_core::{TenantId, WorkflowId};
use gantry_webhook::{adapter_for, ChallengeResponse, WebhookAdapter};
use gantry_workflow::{ProcessedWorkflow, WorkflowStatus};

use crate::error::ApiError;
use crate::state::AppState;

fn lookup_adapter(provider: &str) -> Result<Box<dyn WebhookAdapter>, ApiError> {
    adapter_for(provider).ok_or_else(|| ApiError::NotFound(format!("unknown provider {provider:?}")))
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

fn challenge_reply(challenge: ChallengeResponse) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, challenge.content_type)],
        challenge.body,
    )
        .into_response()
}

/// `GET /webhooks/{provider}/{tenant}/{workflow}` — the provider's
/// verification handshake (Meta `hub.challenge`, Twitter CRC).
pub async fn challenge(
    State(state): State<AppState>,
    Path((provider, tenant, _workflow)): Path<(String, TenantId, WorkflowId)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let adapter = lookup_adapter(&provider)?;
    let secret = state.webhook_secrets.get(&provider, tenant).unwrap_or("");
    let payload = serde_json::to_value(&params)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    adapter
        .handle_challenge(&payload, secret)
        .map(challenge_reply)
        .ok_or_else(|| ApiError::Validation("not a recognized challenge".into()))
}

/// `POST /webhooks/{provider}/{tenant}/{workflow}` — verify, answer
/// body-borne challenges, then synthesize a trigger for the workflow's
/// entry node.
pub async fn receive(
    State(state): State<AppState>,
    Path((provider, tenant, workflow_id)): Path<(String, TenantId, WorkflowId)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let adapter = lookup_adapter(&provider)?;
    let headers = header_map(&headers);

    // Fail closed: no configured secret means no admission.
    let secret = state
        .webhook_secrets
        .get(&provider, tenant)
        .ok_or(ApiError::Unauthorized)?;
    if !adapter.verify_signature(&body, &headers, secret) {
        return Err(ApiError::Unauthorized);
    }

    // One-shot verification handshakes that arrive as signed POSTs
    // (Slack's url_verification).
    if let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&body) {
        if let Some(challenge) = adapter.handle_challenge(&payload, secret) {
            return Ok(challenge_reply(challenge));
        }
    }

    let event = adapter.normalize(&body, &headers, &tenant.to_string());

    let workflow = state.workflows.get(tenant, workflow_id).await?;
    if workflow.status != WorkflowStatus::Published {
        return Err(ApiError::Conflict("workflow is not published".into()));
    }
    let processed = ProcessedWorkflow::process(workflow.nodes.clone(), workflow.edges.clone())
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let entry = processed
        .entry_nodes()
        .first()
        .cloned()
        .ok_or_else(|| ApiError::Validation("workflow has no entry node".into()))?;

    let input = serde_json::to_value(&event).map_err(|e| ApiError::Internal(e.to_string()))?;
    let outcome = state
        .engine
        .trigger_node(
            tenant,
            entry,
            input,
            serde_json::json!({"provider": provider, "event_type": event.event_type}),
            None,
        )
        .await?;

    Ok(Json(serde_json::json!({
        "trigger_id": outcome.trigger_id,
        "execution_id": outcome.execution_id,
        "event_type": event.event_type,
    }))
    .into_response())
}
