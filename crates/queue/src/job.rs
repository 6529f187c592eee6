//! Job payloads and status tracking.

use chrono::{DateTime, Utc};
use gantry_core::{ExecutionId, JobId, NodeKey, TenantId};
use serde::{Deserialize, Serialize};

/// A unit of work: one attempt of one node in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job id.
    pub id: JobId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The run this job belongs to.
    pub execution_id: ExecutionId,
    /// The node to execute.
    pub node: NodeKey,
    /// 1-based attempt number.
    pub attempt: u32,
    /// The lane this job was routed to.
    pub lane: String,
    /// When the job was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    /// Create a job for the given node attempt.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        execution_id: ExecutionId,
        node: NodeKey,
        attempt: u32,
        lane: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::v4(),
            tenant_id,
            execution_id,
            node,
            attempt,
            lane: lane.into(),
            enqueued_at: Utc::now(),
        }
    }

    /// The engine's deduplication key for this job.
    #[must_use]
    pub fn dedup_key(&self) -> (ExecutionId, NodeKey, u32) {
        (self.execution_id, self.node.clone(), self.attempt)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting on its lane.
    Queued,
    /// Waiting out a backoff delay before entering its lane.
    Delayed,
    /// Delivered to a worker.
    InFlight,
    /// Finished successfully.
    Completed,
    /// The attempt failed (the engine may enqueue a successor attempt).
    Failed,
    /// Dropped without executing (duplicate delivery or stale run).
    Dead,
}

impl JobStatus {
    /// Returns `true` once the job can no longer change status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Dead)
    }
}

/// A status-change notification, mirrored into the event store by the
/// engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusChange {
    /// The job.
    pub job_id: JobId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The run the job belongs to.
    pub execution_id: ExecutionId,
    /// The node the job executes.
    pub node: NodeKey,
    /// Attempt number.
    pub attempt: u32,
    /// The lane the job was routed to.
    pub lane: String,
    /// The new status.
    pub status: JobStatus,
}
