//! Postgres backends (behind the `postgres` feature): the workflow,
//! execution, and scheduled-event repositories plus [`PgEventStore`],
//! the durable implementation of the event-store trait.
//!
//! Schema lives in `migrations/`; run them with
//! `sqlx::migrate!("./migrations")` or any migration runner before first
//! use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_core::{EventId, ExecutionId, JobId, NodeKey, ScheduleId, TenantId, WorkflowId};
use gantry_events::{DomainEvent, EventMetadata, EventStore, EventStoreError, StoredEvent};
use gantry_scheduler::{ScheduleStatus, ScheduledEvent};
use gantry_workflow::{WorkflowDefinition, WorkflowStatus};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::error::StorageError;
use crate::records::{ExecutionRecordRow, NodeExecutionRow};
use crate::repository::{ExecutionRepository, ScheduledEventRepository, WorkflowRepository};

fn backend(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn decode<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    what: &str,
) -> Result<T, StorageError> {
    serde_json::from_value(value)
        .map_err(|e| StorageError::Backend(format!("decode {what}: {e}")))
}

fn workflow_from_row(row: &PgRow) -> Result<WorkflowDefinition, StorageError> {
    Ok(WorkflowDefinition {
        id: WorkflowId::from(row.try_get::<uuid::Uuid, _>("id").map_err(backend)?),
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id").map_err(backend)?),
        name: row.try_get("name").map_err(backend)?,
        description: row.try_get("description").map_err(backend)?,
        nodes: decode(row.try_get("nodes").map_err(backend)?, "nodes")?,
        edges: decode(row.try_get("edges").map_err(backend)?, "edges")?,
        tags: decode(row.try_get("tags").map_err(backend)?, "tags")?,
        status: decode(
            serde_json::Value::String(row.try_get::<String, _>("status").map_err(backend)?),
            "status",
        )?,
        version: row.try_get::<i64, _>("version").map_err(backend)? as u64,
        created_at: row.try_get("created_at").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
    })
}

fn status_text(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Draft => "draft",
        WorkflowStatus::Published => "published",
        WorkflowStatus::Archived => "archived",
    }
}

/// Postgres-backed workflow definitions.
pub struct PgWorkflowRepository {
    pool: PgPool,
}

impl PgWorkflowRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowRepository for PgWorkflowRepository {
    async fn create(&self, workflow: WorkflowDefinition) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO workflows \
             (id, tenant_id, name, description, nodes, edges, tags, status, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(workflow.id.get())
        .bind(workflow.tenant_id.get())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(serde_json::to_value(&workflow.nodes).map_err(|e| StorageError::Backend(e.to_string()))?)
        .bind(serde_json::to_value(&workflow.edges).map_err(|e| StorageError::Backend(e.to_string()))?)
        .bind(serde_json::to_value(&workflow.tags).map_err(|e| StorageError::Backend(e.to_string()))?)
        .bind(status_text(workflow.status))
        .bind(workflow.version as i64)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        id: WorkflowId,
    ) -> Result<WorkflowDefinition, StorageError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = $1 AND tenant_id = $2")
            .bind(id.get())
            .bind(tenant_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StorageError::WorkflowNotFound(id))?;
        workflow_from_row(&row)
    }

    async fn update(&self, workflow: WorkflowDefinition) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE workflows SET name = $3, description = $4, nodes = $5, edges = $6, \
             tags = $7, status = $8, version = $9, updated_at = $10 \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(workflow.id.get())
        .bind(workflow.tenant_id.get())
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(serde_json::to_value(&workflow.nodes).map_err(|e| StorageError::Backend(e.to_string()))?)
        .bind(serde_json::to_value(&workflow.edges).map_err(|e| StorageError::Backend(e.to_string()))?)
        .bind(serde_json::to_value(&workflow.tags).map_err(|e| StorageError::Backend(e.to_string()))?)
        .bind(status_text(workflow.status))
        .bind(workflow.version as i64)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::WorkflowNotFound(workflow.id));
        }
        Ok(())
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<WorkflowDefinition>, StorageError> {
        let rows =
            sqlx::query("SELECT * FROM workflows WHERE tenant_id = $1 ORDER BY created_at DESC")
                .bind(tenant_id.get())
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        rows.iter().map(workflow_from_row).collect()
    }

    async fn find_by_node(
        &self,
        tenant_id: TenantId,
        node: &NodeKey,
    ) -> Result<Option<WorkflowDefinition>, StorageError> {
        // Nodes are stored as a JSONB array of objects with an "id" field.
        let row = sqlx::query(
            "SELECT * FROM workflows WHERE tenant_id = $1 AND status = 'published' \
             AND nodes @> $2::jsonb LIMIT 1",
        )
        .bind(tenant_id.get())
        .bind(serde_json::json!([{"id": node.as_str()}]))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.as_ref().map(workflow_from_row).transpose()
    }
}

/// Postgres-backed run snapshots.
pub struct PgExecutionRepository {
    pool: PgPool,
}

impl PgExecutionRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn execution_from_row(row: &PgRow) -> Result<ExecutionRecordRow, StorageError> {
    Ok(ExecutionRecordRow {
        id: ExecutionId::from(row.try_get::<uuid::Uuid, _>("id").map_err(backend)?),
        workflow_id: WorkflowId::from(row.try_get::<uuid::Uuid, _>("workflow_id").map_err(backend)?),
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id").map_err(backend)?),
        state: decode(
            serde_json::Value::String(row.try_get::<String, _>("state").map_err(backend)?),
            "state",
        )?,
        metadata: row.try_get("metadata").map_err(backend)?,
        result: row.try_get("result").map_err(backend)?,
        error: row.try_get("error").map_err(backend)?,
        started_at: row.try_get("started_at").map_err(backend)?,
        completed_at: row.try_get("completed_at").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
    })
}

fn node_from_row(row: &PgRow) -> Result<NodeExecutionRow, StorageError> {
    let node: String = row.try_get("node_id").map_err(backend)?;
    Ok(NodeExecutionRow {
        execution_id: ExecutionId::from(
            row.try_get::<uuid::Uuid, _>("workflow_execution_id").map_err(backend)?,
        ),
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id").map_err(backend)?),
        node: node
            .parse()
            .map_err(|e| StorageError::Backend(format!("node key: {e}")))?,
        state: decode(
            serde_json::Value::String(row.try_get::<String, _>("state").map_err(backend)?),
            "node state",
        )?,
        input: row.try_get("input").map_err(backend)?,
        output: row.try_get("output").map_err(backend)?,
        error: row.try_get("error").map_err(backend)?,
        retry_count: row.try_get::<i64, _>("retry_count").map_err(backend)? as u32,
        started_at: row.try_get("started_at").map_err(backend)?,
        completed_at: row.try_get("completed_at").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
    })
}

#[async_trait]
impl ExecutionRepository for PgExecutionRepository {
    async fn upsert(
        &self,
        execution: ExecutionRecordRow,
        nodes: Vec<NodeExecutionRow>,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO workflow_executions \
             (id, workflow_id, tenant_id, state, metadata, result, error, started_at, completed_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET \
             state = EXCLUDED.state, metadata = EXCLUDED.metadata, result = EXCLUDED.result, \
             error = EXCLUDED.error, completed_at = EXCLUDED.completed_at, updated_at = EXCLUDED.updated_at",
        )
        .bind(execution.id.get())
        .bind(execution.workflow_id.get())
        .bind(execution.tenant_id.get())
        .bind(execution.state.to_string())
        .bind(&execution.metadata)
        .bind(&execution.result)
        .bind(&execution.error)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(execution.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for node in nodes {
            sqlx::query(
                "INSERT INTO node_executions \
                 (workflow_execution_id, tenant_id, node_id, state, input, output, error, retry_count, started_at, completed_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                 ON CONFLICT (workflow_execution_id, node_id) DO UPDATE SET \
                 state = EXCLUDED.state, input = EXCLUDED.input, output = EXCLUDED.output, \
                 error = EXCLUDED.error, retry_count = EXCLUDED.retry_count, \
                 started_at = EXCLUDED.started_at, completed_at = EXCLUDED.completed_at, \
                 updated_at = EXCLUDED.updated_at",
            )
            .bind(node.execution_id.get())
            .bind(node.tenant_id.get())
            .bind(node.node.as_str())
            .bind(node.state.to_string())
            .bind(&node.input)
            .bind(&node.output)
            .bind(&node.error)
            .bind(i64::from(node.retry_count))
            .bind(node.started_at)
            .bind(node.completed_at)
            .bind(node.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
    ) -> Result<ExecutionRecordRow, StorageError> {
        let row = sqlx::query(
            "SELECT * FROM workflow_executions WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id.get())
        .bind(tenant_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StorageError::ExecutionNotFound(id))?;
        execution_from_row(&row)
    }

    async fn list_by_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> Result<Vec<ExecutionRecordRow>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_executions \
             WHERE tenant_id = $1 AND workflow_id = $2 ORDER BY started_at DESC",
        )
        .bind(tenant_id.get())
        .bind(workflow_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(execution_from_row).collect()
    }

    async fn list_node_executions(
        &self,
        tenant_id: TenantId,
        node: &NodeKey,
    ) -> Result<Vec<NodeExecutionRow>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM node_executions \
             WHERE tenant_id = $1 AND node_id = $2 ORDER BY updated_at DESC",
        )
        .bind(tenant_id.get())
        .bind(node.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(node_from_row).collect()
    }
}

/// Postgres-backed scheduled events.
pub struct PgScheduledEventRepository {
    pool: PgPool,
}

impl PgScheduledEventRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn schedule_status_text(status: ScheduleStatus) -> &'static str {
    match status {
        ScheduleStatus::Active => "active",
        ScheduleStatus::Paused => "paused",
        ScheduleStatus::Completed => "completed",
    }
}

fn scheduled_from_row(row: &PgRow) -> Result<ScheduledEvent, StorageError> {
    let node: String = row.try_get("node_id").map_err(backend)?;
    let schedule: Option<serde_json::Value> = row.try_get("schedule").map_err(backend)?;
    Ok(ScheduledEvent {
        id: ScheduleId::from(row.try_get::<uuid::Uuid, _>("id").map_err(backend)?),
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id").map_err(backend)?),
        workflow_id: WorkflowId::from(row.try_get::<uuid::Uuid, _>("workflow_id").map_err(backend)?),
        node: node
            .parse()
            .map_err(|e| StorageError::Backend(format!("node key: {e}")))?,
        data: row.try_get("data").map_err(backend)?,
        schedule: schedule.map(|s| decode(s, "schedule")).transpose()?,
        status: decode(
            serde_json::Value::String(row.try_get::<String, _>("status").map_err(backend)?),
            "schedule status",
        )?,
        last_run: row.try_get("last_run").map_err(backend)?,
        next_run: row.try_get("next_run").map_err(backend)?,
        metadata: row
            .try_get::<Option<serde_json::Value>, _>("metadata")
            .map_err(backend)?
            .unwrap_or(serde_json::Value::Null),
        created_at: row.try_get("created_at").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
    })
}

#[async_trait]
impl ScheduledEventRepository for PgScheduledEventRepository {
    async fn upsert(&self, event: ScheduledEvent) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO scheduled_events \
             (id, tenant_id, workflow_id, node_id, data, schedule, status, last_run, next_run, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (id) DO UPDATE SET \
             data = EXCLUDED.data, schedule = EXCLUDED.schedule, status = EXCLUDED.status, \
             last_run = EXCLUDED.last_run, next_run = EXCLUDED.next_run, \
             metadata = EXCLUDED.metadata, updated_at = EXCLUDED.updated_at",
        )
        .bind(event.id.get())
        .bind(event.tenant_id.get())
        .bind(event.workflow_id.get())
        .bind(event.node.as_str())
        .bind(&event.data)
        .bind(
            event
                .schedule
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        )
        .bind(schedule_status_text(event.status))
        .bind(event.last_run)
        .bind(event.next_run)
        .bind(&event.metadata)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        id: ScheduleId,
    ) -> Result<ScheduledEvent, StorageError> {
        let row = sqlx::query("SELECT * FROM scheduled_events WHERE id = $1 AND tenant_id = $2")
            .bind(id.get())
            .bind(tenant_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StorageError::ScheduledEventNotFound(id))?;
        scheduled_from_row(&row)
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        status: Option<ScheduleStatus>,
    ) -> Result<Vec<ScheduledEvent>, StorageError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM scheduled_events \
                     WHERE tenant_id = $1 AND status = $2 ORDER BY created_at",
                )
                .bind(tenant_id.get())
                .bind(schedule_status_text(status))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT * FROM scheduled_events WHERE tenant_id = $1 ORDER BY created_at",
                )
                .bind(tenant_id.get())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend)?;
        rows.iter().map(scheduled_from_row).collect()
    }

    async fn set_status(
        &self,
        tenant_id: TenantId,
        id: ScheduleId,
        status: ScheduleStatus,
    ) -> Result<ScheduledEvent, StorageError> {
        let row = sqlx::query(
            "UPDATE scheduled_events SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 RETURNING *",
        )
        .bind(id.get())
        .bind(tenant_id.get())
        .bind(schedule_status_text(status))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StorageError::ScheduledEventNotFound(id))?;
        scheduled_from_row(&row)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEvent>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM scheduled_events WHERE status = 'active' AND next_run <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(scheduled_from_row).collect()
    }
}

/// How many times a sequence-contended append retries before giving up.
const APPEND_RETRIES: usize = 3;

fn ev_backend(e: sqlx::Error) -> EventStoreError {
    EventStoreError::Backend(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn event_from_row(row: &PgRow) -> Result<StoredEvent, EventStoreError> {
    let node: Option<String> = row.try_get("node_id").map_err(ev_backend)?;
    let node = node
        .map(|n| n.parse::<NodeKey>())
        .transpose()
        .map_err(|e| EventStoreError::Backend(format!("node key: {e}")))?;
    let event = DomainEvent {
        id: EventId::from(row.try_get::<uuid::Uuid, _>("id").map_err(ev_backend)?),
        event_type: row.try_get("event_type").map_err(ev_backend)?,
        timestamp: row.try_get("timestamp").map_err(ev_backend)?,
        tenant_id: TenantId::from(row.try_get::<uuid::Uuid, _>("tenant_id").map_err(ev_backend)?),
        payload: row.try_get("payload").map_err(ev_backend)?,
        metadata: EventMetadata {
            workflow_id: row
                .try_get::<Option<uuid::Uuid>, _>("workflow_id")
                .map_err(ev_backend)?
                .map(WorkflowId::from),
            execution_id: row
                .try_get::<Option<uuid::Uuid>, _>("execution_id")
                .map_err(ev_backend)?
                .map(ExecutionId::from),
            node,
            job_id: row
                .try_get::<Option<uuid::Uuid>, _>("job_id")
                .map_err(ev_backend)?
                .map(JobId::from),
        },
    };
    let sequence = row.try_get::<i64, _>("sequence_number").map_err(ev_backend)? as u64;
    Ok(StoredEvent { event, sequence })
}

/// Postgres-backed durable event store.
///
/// Sequences are monotone per tenant, enforced by the unique
/// `(tenant_id, sequence_number)` index; a concurrent writer losing the
/// race retries its append. Timestamps are nudged forward past the
/// tenant's last stored event so `last + 1ms` replay restarts stay exact,
/// matching the in-memory store.
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, mut event: DomainEvent) -> Result<StoredEvent, EventStoreError> {
        for _ in 0..APPEND_RETRIES {
            let mut tx = self.pool.begin().await.map_err(ev_backend)?;

            let head = sqlx::query(
                "SELECT COALESCE(MAX(sequence_number), 0) AS seq, MAX(timestamp) AS ts \
                 FROM event_store WHERE tenant_id = $1",
            )
            .bind(event.tenant_id.get())
            .fetch_one(&mut *tx)
            .await
            .map_err(ev_backend)?;
            let sequence = head.try_get::<i64, _>("seq").map_err(ev_backend)? + 1;
            let last_ts: Option<DateTime<Utc>> = head.try_get("ts").map_err(ev_backend)?;
            if let Some(last) = last_ts {
                if event.timestamp <= last {
                    event.timestamp = last + chrono::Duration::milliseconds(1);
                }
            }

            let inserted = sqlx::query(
                "INSERT INTO event_store \
                 (id, event_type, tenant_id, workflow_id, execution_id, node_id, job_id, payload, sequence_number, timestamp, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'published')",
            )
            .bind(event.id.get())
            .bind(&event.event_type)
            .bind(event.tenant_id.get())
            .bind(event.metadata.workflow_id.map(|w| w.get()))
            .bind(event.metadata.execution_id.map(|e| e.get()))
            .bind(event.metadata.node.as_ref().map(NodeKey::as_str))
            .bind(event.metadata.job_id.map(|j| j.get()))
            .bind(&event.payload)
            .bind(sequence)
            .bind(event.timestamp)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {
                    tx.commit().await.map_err(ev_backend)?;
                    return Ok(StoredEvent { event, sequence: sequence as u64 });
                }
                Err(e) if is_unique_violation(&e) => {
                    // A concurrent writer took this sequence slot.
                    let _ = tx.rollback().await;
                }
                Err(e) => return Err(ev_backend(e)),
            }
        }
        Err(EventStoreError::Backend(
            "append retries exhausted under sequence contention".into(),
        ))
    }

    async fn by_type(
        &self,
        tenant_id: TenantId,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            "SELECT * FROM event_store WHERE tenant_id = $1 AND event_type = $2 \
             ORDER BY timestamp DESC LIMIT $3",
        )
        .bind(tenant_id.get())
        .bind(event_type)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(ev_backend)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn by_tenant(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            "SELECT * FROM event_store WHERE tenant_id = $1 ORDER BY sequence_number",
        )
        .bind(tenant_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(ev_backend)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn by_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            "SELECT * FROM event_store WHERE tenant_id = $1 AND workflow_id = $2 \
             ORDER BY sequence_number",
        )
        .bind(tenant_id.get())
        .bind(workflow_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(ev_backend)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn by_execution(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            "SELECT * FROM event_store WHERE tenant_id = $1 AND execution_id = $2 \
             ORDER BY sequence_number",
        )
        .bind(tenant_id.get())
        .bind(execution_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(ev_backend)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn by_time_range(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            "SELECT * FROM event_store \
             WHERE tenant_id = $1 AND timestamp >= $2 AND timestamp <= $3 \
             ORDER BY timestamp, sequence_number",
        )
        .bind(tenant_id.get())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(ev_backend)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn replay(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        batch_size: usize,
        handler: &mut (dyn for<'a> FnMut(&'a DomainEvent) + Send),
    ) -> Result<usize, EventStoreError> {
        let batch_size = batch_size.max(1);
        let mut count = 0usize;
        let mut offset = 0i64;
        loop {
            let rows = sqlx::query(
                "SELECT * FROM event_store \
                 WHERE timestamp >= $1 AND timestamp <= $2 \
                 ORDER BY timestamp, tenant_id, sequence_number \
                 LIMIT $3 OFFSET $4",
            )
            .bind(start)
            .bind(end)
            .bind(batch_size as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(ev_backend)?;
            if rows.is_empty() {
                break;
            }
            let fetched = rows.len();
            for row in &rows {
                let stored = event_from_row(row)?;
                handler(&stored.event);
                count += 1;
            }
            if fetched < batch_size {
                break;
            }
            offset += fetched as i64;
        }
        Ok(count)
    }
}
