#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Queue
//!
//! The work queue between the engine's scheduler and its workers: named
//! lanes (one per node type, plus `default`), delayed delivery for retry
//! backoff, per-lane in-flight accounting for backpressure, and job status
//! tracking.
//!
//! Delivery is at-least-once: a delivered job that is neither completed nor
//! failed may be re-enqueued by the engine, and consumers deduplicate on
//! `(execution, node, attempt)`.

pub mod job;
pub mod lane;
pub mod queue;

pub use job::{Job, JobStatus, JobStatusChange};
pub use lane::LaneMap;
pub use queue::{JobQueue, QueueError};
