//! Built-in node strategies.

mod agent;
mod decision;
mod delay;
mod http;
mod transform;
mod webhook_sink;

pub use agent::AgentStrategy;
pub use decision::DecisionStrategy;
pub use delay::DelayStrategy;
pub use http::HttpStrategy;
pub use transform::TransformStrategy;
pub use webhook_sink::WebhookSinkStrategy;
