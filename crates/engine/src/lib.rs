#![forbid(unsafe_code)]

//! # Gantry Engine
//!
//! The orchestrator. The engine owns every live run [`Context`], consumes
//! job deliveries from the queue, drives the state machine, and schedules
//! successors:
//!
//! - **Trigger admission** — deduplicated by trigger id, persisted as an
//!   event, deferred under backpressure.
//! - **Workers** — N tasks consuming all queue lanes; per-run transitions
//!   are serialized behind a run-level mutex, strategy execution happens
//!   outside it.
//! - **Successor selection** — edge conditions fire or suppress targets;
//!   convergence nodes wait for every required predecessor; suppressed
//!   subgraphs skip recursively.
//! - **Retry policy** — strategy-declared retryable errors retry with
//!   jittered exponential backoff up to the per-run/per-node budget;
//!   exhaustion routes along a `failure` edge or fails the run.
//! - **Lifecycle** — pause defers successor scheduling, resume drains the
//!   deferral queue, cancel broadcasts a cooperative signal and reclaims
//!   slots after a grace window.
//!
//! Every state-machine event is persisted through the event bus before
//! any successor is scheduled.
//!
//! [`Context`]: gantry_execution::Context

pub mod config;
pub mod engine;
pub mod error;
pub mod selection;
pub mod worker;

pub use config::EngineConfig;
pub use engine::{Engine, TriggerOutcome};
pub use error::EngineError;
