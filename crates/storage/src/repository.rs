//! Repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_core::{ExecutionId, NodeKey, ScheduleId, TenantId, WorkflowId};
use gantry_scheduler::{ScheduleStatus, ScheduledEvent};
use gantry_workflow::WorkflowDefinition;

use crate::error::StorageError;
use crate::records::{ExecutionRecordRow, NodeExecutionRow};

/// Stored workflow definitions.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Persist a new definition.
    async fn create(&self, workflow: WorkflowDefinition) -> Result<(), StorageError>;

    /// Fetch a definition.
    async fn get(
        &self,
        tenant_id: TenantId,
        id: WorkflowId,
    ) -> Result<WorkflowDefinition, StorageError>;

    /// Replace a definition (callers bump `version` and `updated_at`).
    async fn update(&self, workflow: WorkflowDefinition) -> Result<(), StorageError>;

    /// All definitions for a tenant.
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<WorkflowDefinition>, StorageError>;

    /// The published definition containing the given node, if any.
    async fn find_by_node(
        &self,
        tenant_id: TenantId,
        node: &NodeKey,
    ) -> Result<Option<WorkflowDefinition>, StorageError>;
}

/// Stored run and node-run snapshots.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Insert or update a run snapshot with its node rows.
    async fn upsert(
        &self,
        execution: ExecutionRecordRow,
        nodes: Vec<NodeExecutionRow>,
    ) -> Result<(), StorageError>;

    /// Fetch one run snapshot.
    async fn get(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
    ) -> Result<ExecutionRecordRow, StorageError>;

    /// Runs of one workflow, newest first.
    async fn list_by_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> Result<Vec<ExecutionRecordRow>, StorageError>;

    /// Node rows across runs for one node key, newest first.
    async fn list_node_executions(
        &self,
        tenant_id: TenantId,
        node: &NodeKey,
    ) -> Result<Vec<NodeExecutionRow>, StorageError>;
}

/// Stored scheduled events.
#[async_trait]
pub trait ScheduledEventRepository: Send + Sync {
    /// Insert or replace a scheduled event.
    async fn upsert(&self, event: ScheduledEvent) -> Result<(), StorageError>;

    /// Fetch one scheduled event.
    async fn get(
        &self,
        tenant_id: TenantId,
        id: ScheduleId,
    ) -> Result<ScheduledEvent, StorageError>;

    /// Events for a tenant, optionally filtered by status.
    async fn list(
        &self,
        tenant_id: TenantId,
        status: Option<ScheduleStatus>,
    ) -> Result<Vec<ScheduledEvent>, StorageError>;

    /// Update only the status of an event.
    async fn set_status(
        &self,
        tenant_id: TenantId,
        id: ScheduleId,
        status: ScheduleStatus,
    ) -> Result<ScheduledEvent, StorageError>;

    /// Active events due at `now`, across tenants.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEvent>, StorageError>;
}
