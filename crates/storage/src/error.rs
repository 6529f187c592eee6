//! Storage errors.

use gantry_core::{ExecutionId, ScheduleId, WorkflowId};
use thiserror::Error;

/// Errors produced by repositories.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Workflow not found for the tenant.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    /// Execution not found for the tenant.
    #[error("execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    /// Scheduled event not found for the tenant.
    #[error("scheduled event not found: {0}")]
    ScheduledEventNotFound(ScheduleId),

    /// An optimistic version check failed.
    #[error("version conflict on workflow {workflow}: expected {expected}, found {found}")]
    VersionConflict {
        /// The workflow.
        workflow: WorkflowId,
        /// The caller's expected version.
        expected: u64,
        /// The stored version.
        found: u64,
    },

    /// The backend rejected or lost the operation.
    #[error("storage backend: {0}")]
    Backend(String),
}
