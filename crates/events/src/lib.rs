#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Events
//!
//! Domain events, the durable event store, and the event bus.
//!
//! Publishing is atomic with appending from the engine's perspective: an
//! event counts as published only once the store acknowledges the append.
//! Subscribers are invoked afterwards; a failing subscriber never
//! unpublishes. Delivery is at-least-once, so consumers are expected to be
//! idempotent keyed on the event id.

pub mod bus;
pub mod event;
pub mod store;

pub use bus::{EventBus, EventSubscriber};
pub use event::{DomainEvent, EventMetadata};
pub use store::{EventStore, EventStoreError, MemoryEventStore, StoredEvent};

/// Canonical event type names.
pub mod names {
    /// Workflow run started.
    pub const WORKFLOW_STARTED: &str = "workflow.execution.started";
    /// Workflow run completed.
    pub const WORKFLOW_COMPLETED: &str = "workflow.execution.completed";
    /// Workflow run failed.
    pub const WORKFLOW_FAILED: &str = "workflow.execution.failed";
    /// Workflow run paused.
    pub const WORKFLOW_PAUSED: &str = "workflow.execution.paused";
    /// Workflow run resumed.
    pub const WORKFLOW_RESUMED: &str = "workflow.execution.resumed";
    /// Workflow run cancelled.
    pub const WORKFLOW_CANCELLED: &str = "workflow.execution.cancelled";

    /// Node scheduled onto the queue.
    pub const NODE_SCHEDULED: &str = "node.execution.scheduled";
    /// Node started executing.
    pub const NODE_STARTED: &str = "node.execution.started";
    /// Node completed.
    pub const NODE_COMPLETED: &str = "node.execution.completed";
    /// Node failed (one attempt).
    pub const NODE_FAILED: &str = "node.execution.failed";
    /// Node skipped (all incoming edges suppressed).
    pub const NODE_SKIPPED: &str = "node.execution.skipped";
    /// Node cancelled with the run.
    pub const NODE_CANCELLED: &str = "node.execution.cancelled";

    /// A trigger was admitted (or deferred) by the engine.
    pub const TRIGGER_RECEIVED: &str = "trigger.received";

    /// Job status mirror events.
    pub const JOB_QUEUED: &str = "job.status.queued";
    /// Job picked up by a worker.
    pub const JOB_IN_FLIGHT: &str = "job.status.in_flight";
    /// Job finished.
    pub const JOB_COMPLETED: &str = "job.status.completed";
    /// Job failed.
    pub const JOB_FAILED: &str = "job.status.failed";
}
