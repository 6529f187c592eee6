//! Strategy registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builtin::{
    AgentStrategy, DecisionStrategy, DelayStrategy, HttpStrategy, TransformStrategy,
    WebhookSinkStrategy,
};
use crate::strategy::Strategy;

/// Maps node `type` tags to strategy implementations.
///
/// The engine populates this at startup and resolves node types from
/// workflow definitions to concrete handlers. Strategies are stored as
/// `Arc<dyn Strategy>` so concurrent executions share one instance.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in strategy registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HttpStrategy::new()));
        registry.register(Arc::new(TransformStrategy));
        registry.register(Arc::new(DecisionStrategy));
        registry.register(Arc::new(DelayStrategy));
        registry.register(Arc::new(WebhookSinkStrategy));
        registry.register(Arc::new(AgentStrategy::new()));
        registry
    }

    /// Register a strategy. Overwrites any existing entry for the type.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(strategy.node_type().to_string(), strategy);
    }

    /// Look up a strategy by node type.
    #[must_use]
    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn Strategy>> {
        self.strategies.get(node_type)
    }

    /// Whether a strategy is registered for the type.
    #[must_use]
    pub fn contains(&self, node_type: &str) -> bool {
        self.strategies.contains_key(node_type)
    }

    /// All registered node types.
    #[must_use]
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Number of registered strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns `true` if no strategies are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}
