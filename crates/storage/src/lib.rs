#![forbid(unsafe_code)]

//! # Gantry Storage
//!
//! Repository traits and implementations mirroring the persisted layout:
//! `workflows`, `workflow_executions`, `node_executions`, and
//! `scheduled_events`. The in-memory backend is the default; a `postgres`
//! cargo feature gates a sqlx backend over the same traits (schema in
//! `migrations/`).

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod records;
pub mod repository;

pub use error::StorageError;
pub use memory::{MemoryExecutionRepository, MemoryScheduledEventRepository, MemoryWorkflowRepository};
pub use records::{ExecutionRecordRow, NodeExecutionRow};
pub use repository::{ExecutionRepository, ScheduledEventRepository, WorkflowRepository};
