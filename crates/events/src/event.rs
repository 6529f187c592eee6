//! Domain event envelope.

use chrono::{DateTime, Utc};
use gantry_core::{EventId, ExecutionId, JobId, NodeKey, TenantId, WorkflowId};
use serde::{Deserialize, Serialize};

/// Correlation metadata carried by a domain event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Workflow the event belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    /// Run the event belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    /// Node the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeKey>,
    /// Queue job the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

/// A domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event id; consumers deduplicate on this.
    pub id: EventId,
    /// Dotted event type name (see [`crate::names`]).
    pub event_type: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Event payload.
    pub payload: serde_json::Value,
    /// Correlation metadata.
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl DomainEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        tenant_id: TenantId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::v4(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            tenant_id,
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Attach a workflow id, builder-style.
    #[must_use]
    pub fn with_workflow(mut self, workflow_id: WorkflowId) -> Self {
        self.metadata.workflow_id = Some(workflow_id);
        self
    }

    /// Attach an execution id, builder-style.
    #[must_use]
    pub fn with_execution(mut self, execution_id: ExecutionId) -> Self {
        self.metadata.execution_id = Some(execution_id);
        self
    }

    /// Attach a node key, builder-style.
    #[must_use]
    pub fn with_node(mut self, node: NodeKey) -> Self {
        self.metadata.node = Some(node);
        self
    }

    /// Attach a job id, builder-style.
    #[must_use]
    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.metadata.job_id = Some(job_id);
        self
    }
}
