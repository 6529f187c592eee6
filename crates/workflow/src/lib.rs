#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Workflow
//!
//! Workflow definitions and the graph processor for the Gantry workflow
//! engine. This crate is pure — no I/O — and defines:
//!
//! - [`WorkflowDefinition`], [`NodeDefinition`], [`Edge`] — the authored
//!   shape of a workflow.
//! - [`ProcessedWorkflow`] — the derived, immutable DAG metadata: adjacency,
//!   entry/exit nodes, branch and convergence points, parallel groups, and a
//!   topological order.
//! - [`NodeState`] — the per-node lifecycle states shared with the
//!   execution layer.
//!
//! Graph processing validates the authored node/edge lists against the
//! structural invariants (known endpoints, no self-edges, at least one
//! entry and one exit, acyclicity, full reachability) and fails
//! synchronously with the first violated invariant.

pub mod definition;
pub mod error;
pub mod graph;
pub mod state;

pub use definition::{Edge, EdgeKind, NodeDefinition, WorkflowDefinition, WorkflowStatus};
pub use error::WorkflowError;
pub use graph::ProcessedWorkflow;
pub use state::NodeState;
