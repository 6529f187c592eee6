#![forbid(unsafe_code)]

//! # Gantry Strategy
//!
//! The node execution contract and its built-in implementations.
//!
//! Every node type registers a [`Strategy`] with three operations:
//!
//! - [`Strategy::validate`] — pure, field-level configuration checks,
//! - [`Strategy::execute`] — computes a result from the node's resolved
//!   input; may suspend arbitrarily long but must honor the run's
//!   cancellation token,
//! - [`Strategy::cleanup`] — best-effort, runs on every exit path from
//!   `execute`, never propagates errors to the engine.
//!
//! Built-ins: `http`, `transform`, `decision`, `delay`, `webhook`
//! (sink), and `agent`.

pub mod builtin;
pub mod error;
pub mod registry;
pub mod strategy;
pub mod view;

pub use builtin::{
    AgentStrategy, DecisionStrategy, DelayStrategy, HttpStrategy, TransformStrategy,
    WebhookSinkStrategy,
};
pub use error::{FieldError, StrategyError, ValidationReport};
pub use registry::StrategyRegistry;
pub use strategy::Strategy;
pub use view::RunView;
