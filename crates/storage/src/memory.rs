//! In-memory repositories.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gantry_core::{ExecutionId, NodeKey, ScheduleId, TenantId, WorkflowId};
use gantry_scheduler::{ScheduleStatus, ScheduledEvent, ScheduledEventStore};
use gantry_workflow::{WorkflowDefinition, WorkflowStatus};
use parking_lot::RwLock;

use crate::error::StorageError;
use crate::records::{ExecutionRecordRow, NodeExecutionRow};
use crate::repository::{ExecutionRepository, ScheduledEventRepository, WorkflowRepository};

/// In-memory workflow definitions.
#[derive(Default)]
pub struct MemoryWorkflowRepository {
    workflows: RwLock<HashMap<WorkflowId, WorkflowDefinition>>,
}

impl MemoryWorkflowRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRepository for MemoryWorkflowRepository {
    async fn create(&self, workflow: WorkflowDefinition) -> Result<(), StorageError> {
        self.workflows.write().insert(workflow.id, workflow);
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        id: WorkflowId,
    ) -> Result<WorkflowDefinition, StorageError> {
        self.workflows
            .read()
            .get(&id)
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
            .ok_or(StorageError::WorkflowNotFound(id))
    }

    async fn update(&self, workflow: WorkflowDefinition) -> Result<(), StorageError> {
        let mut workflows = self.workflows.write();
        match workflows.get(&workflow.id) {
            Some(existing) if existing.tenant_id == workflow.tenant_id => {
                workflows.insert(workflow.id, workflow);
                Ok(())
            }
            _ => Err(StorageError::WorkflowNotFound(workflow.id)),
        }
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<WorkflowDefinition>, StorageError> {
        let mut list: Vec<WorkflowDefinition> = self
            .workflows
            .read()
            .values()
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn find_by_node(
        &self,
        tenant_id: TenantId,
        node: &NodeKey,
    ) -> Result<Option<WorkflowDefinition>, StorageError> {
        Ok(self
            .workflows
            .read()
            .values()
            .find(|w| {
                w.tenant_id == tenant_id
                    && w.status == WorkflowStatus::Published
                    && w.contains_node(node)
            })
            .cloned())
    }
}

/// In-memory run snapshots.
#[derive(Default)]
pub struct MemoryExecutionRepository {
    executions: RwLock<HashMap<ExecutionId, (ExecutionRecordRow, Vec<NodeExecutionRow>)>>,
}

impl MemoryExecutionRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionRepository for MemoryExecutionRepository {
    async fn upsert(
        &self,
        execution: ExecutionRecordRow,
        nodes: Vec<NodeExecutionRow>,
    ) -> Result<(), StorageError> {
        self.executions.write().insert(execution.id, (execution, nodes));
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        id: ExecutionId,
    ) -> Result<ExecutionRecordRow, StorageError> {
        self.executions
            .read()
            .get(&id)
            .filter(|(row, _)| row.tenant_id == tenant_id)
            .map(|(row, _)| row.clone())
            .ok_or(StorageError::ExecutionNotFound(id))
    }

    async fn list_by_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> Result<Vec<ExecutionRecordRow>, StorageError> {
        let mut rows: Vec<ExecutionRecordRow> = self
            .executions
            .read()
            .values()
            .filter(|(row, _)| row.tenant_id == tenant_id && row.workflow_id == workflow_id)
            .map(|(row, _)| row.clone())
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(rows)
    }

    async fn list_node_executions(
        &self,
        tenant_id: TenantId,
        node: &NodeKey,
    ) -> Result<Vec<NodeExecutionRow>, StorageError> {
        let mut rows: Vec<NodeExecutionRow> = self
            .executions
            .read()
            .values()
            .filter(|(row, _)| row.tenant_id == tenant_id)
            .flat_map(|(_, nodes)| nodes.iter().filter(|n| &n.node == node).cloned())
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }
}

/// In-memory scheduled events.
#[derive(Default)]
pub struct MemoryScheduledEventRepository {
    events: RwLock<HashMap<ScheduleId, ScheduledEvent>>,
}

impl MemoryScheduledEventRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduledEventRepository for MemoryScheduledEventRepository {
    async fn upsert(&self, event: ScheduledEvent) -> Result<(), StorageError> {
        self.events.write().insert(event.id, event);
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        id: ScheduleId,
    ) -> Result<ScheduledEvent, StorageError> {
        self.events
            .read()
            .get(&id)
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .ok_or(StorageError::ScheduledEventNotFound(id))
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        status: Option<ScheduleStatus>,
    ) -> Result<Vec<ScheduledEvent>, StorageError> {
        let mut list: Vec<ScheduledEvent> = self
            .events
            .read()
            .values()
            .filter(|e| e.tenant_id == tenant_id && status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(list)
    }

    async fn set_status(
        &self,
        tenant_id: TenantId,
        id: ScheduleId,
        status: ScheduleStatus,
    ) -> Result<ScheduledEvent, StorageError> {
        let mut events = self.events.write();
        let event = events
            .get_mut(&id)
            .filter(|e| e.tenant_id == tenant_id)
            .ok_or(StorageError::ScheduledEventNotFound(id))?;
        event.status = status;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEvent>, StorageError> {
        Ok(self
            .events
            .read()
            .values()
            .filter(|e| e.is_due(now))
            .cloned()
            .collect())
    }
}

// The scheduler loop drives repositories through its own narrow surface.
#[async_trait]
impl ScheduledEventStore for MemoryScheduledEventRepository {
    async fn due(&self, now: DateTime<Utc>) -> Vec<ScheduledEvent> {
        ScheduledEventRepository::due(self, now).await.unwrap_or_default()
    }

    async fn save(&self, event: ScheduledEvent) {
        let _ = ScheduledEventRepository::upsert(self, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_workflow::NodeDefinition;
    use pretty_assertions::assert_eq;

    fn key(s: &str) -> NodeKey {
        NodeKey::new(s).unwrap()
    }

    fn definition(tenant: TenantId) -> WorkflowDefinition {
        WorkflowDefinition::new(
            tenant,
            "wf",
            vec![NodeDefinition::new(key("n1"), "transform", "n1")],
            vec![],
        )
    }

    #[tokio::test]
    async fn workflow_crud_is_tenant_scoped() {
        let repo = MemoryWorkflowRepository::new();
        let tenant = TenantId::v4();
        let wf = definition(tenant);
        let id = wf.id;
        repo.create(wf).await.unwrap();

        assert!(repo.get(tenant, id).await.is_ok());
        assert!(repo.get(TenantId::v4(), id).await.is_err());
        assert_eq!(repo.list(tenant).await.unwrap().len(), 1);
        assert!(repo.list(TenantId::v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_by_node_requires_published() {
        let repo = MemoryWorkflowRepository::new();
        let tenant = TenantId::v4();
        let mut wf = definition(tenant);
        repo.create(wf.clone()).await.unwrap();

        assert!(repo.find_by_node(tenant, &key("n1")).await.unwrap().is_none());

        wf.status = WorkflowStatus::Published;
        repo.update(wf).await.unwrap();
        let found = repo.find_by_node(tenant, &key("n1")).await.unwrap().unwrap();
        assert!(found.contains_node(&key("n1")));
        assert!(repo.find_by_node(tenant, &key("other")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scheduled_event_status_transitions() {
        let repo = MemoryScheduledEventRepository::new();
        let tenant = TenantId::v4();
        let event = ScheduledEvent::new(
            tenant,
            WorkflowId::v4(),
            key("n1"),
            serde_json::Value::Null,
            None,
        )
        .unwrap();
        let id = event.id;
        ScheduledEventRepository::upsert(&repo, event).await.unwrap();

        let paused = repo.set_status(tenant, id, ScheduleStatus::Paused).await.unwrap();
        assert_eq!(paused.status, ScheduleStatus::Paused);

        let listed = repo.list(tenant, Some(ScheduleStatus::Paused)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(repo.list(tenant, Some(ScheduleStatus::Active)).await.unwrap().is_empty());

        // Paused events are not due.
        let due = ScheduledEventRepository::due(&repo, Utc::now()).await.unwrap();
        assert!(due.is_empty());
    }
}
