//! Scheduled event routes.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use gantry_core::{NodeKey, ScheduleId, TenantId, WorkflowId};
use gantry_scheduler::{Schedule, ScheduleStatus, ScheduledEvent, TriggerSink};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
    /// Present on update; absent on create.
    #[serde(default)]
    id: Option<ScheduleId>,
    workflow_id: WorkflowId,
    node: NodeKey,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    schedule: Option<Schedule>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    status: Option<ScheduleStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    status: ScheduleStatus,
}

/// `POST /scheduler/{tenant}/events` — create, or update when `id` is
/// given.
pub async fn upsert(
    State(state): State<AppState>,
    Path(tenant): Path<TenantId>,
    Json(body): Json<UpsertBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // The workflow must exist for this tenant.
    state.workflows.get(tenant, body.workflow_id).await?;
    if let Some(schedule) = &body.schedule {
        schedule
            .validate()
            .map_err(|e| ApiError::Validation(e.to_string()))?;
    }

    let event = match body.id {
        None => ScheduledEvent::new(tenant, body.workflow_id, body.node, body.data, body.schedule)
            .map_err(|e| ApiError::Validation(e.to_string()))?,
        Some(id) => {
            let mut event = state.schedules.get(tenant, id).await?;
            event.workflow_id = body.workflow_id;
            event.node = body.node;
            event.data = body.data;
            event.next_run = match &body.schedule {
                Some(schedule) => schedule
                    .next_after(Utc::now())
                    .map_err(|e| ApiError::Validation(e.to_string()))?,
                None => Some(Utc::now()),
            };
            event.schedule = body.schedule;
            event.updated_at = Utc::now();
            event
        }
    };

    let id = event.id;
    state.schedules.upsert(event).await?;
    Ok(Json(serde_json::json!({"id": id})))
}

/// `GET /scheduler/{tenant}/events?status=active`
pub async fn list(
    State(state): State<AppState>,
    Path(tenant): Path<TenantId>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ScheduledEvent>>, ApiError> {
    let events = state.schedules.list(tenant, query.status).await?;
    Ok(Json(events))
}

/// `PATCH /scheduler/{tenant}/events/{id}/status`
pub async fn set_status(
    State(state): State<AppState>,
    Path((tenant, id)): Path<(TenantId, ScheduleId)>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ScheduledEvent>, ApiError> {
    let event = state.schedules.set_status(tenant, id, body.status).await?;
    Ok(Json(event))
}

/// `POST /scheduler/{tenant}/events/{id}/trigger` — fire immediately
/// without advancing the recurrence.
pub async fn fire(
    State(state): State<AppState>,
    Path((tenant, id)): Path<(TenantId, ScheduleId)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut event = state.schedules.get(tenant, id).await?;
    state
        .engine
        .trigger(&event)
        .await
        .map_err(ApiError::Internal)?;
    event.last_run = Some(Utc::now());
    event.updated_at = Utc::now();
    state.schedules.upsert(event).await?;
    Ok(Json(serde_json::json!({"id": id, "fired": true})))
}
