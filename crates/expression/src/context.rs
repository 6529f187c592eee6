//! Evaluation context: the named roots an expression can reference.

use std::collections::HashMap;

use serde_json::Value;

/// Named roots available to an expression.
///
/// The engine binds `input`, `output`, and `variables` for edge
/// conditions and mappings, plus `data` (the conventional alias for the
/// value under transformation, or the producing node's output in
/// conditions). Strategies bind whatever subset applies.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    roots: HashMap<String, Value>,
}

impl EvalContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a root value, builder-style. Rebinding replaces.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.roots.insert(name.into(), value);
        self
    }

    /// Bind a root value in place.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.roots.insert(name.into(), value);
    }

    /// Resolve a root by name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.roots.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_and_resolution() {
        let ctx = EvalContext::new()
            .with("data", json!({"v": 3}))
            .with("variables", json!({"tenant": "acme"}));
        assert_eq!(ctx.resolve("data"), Some(&json!({"v": 3})));
        assert_eq!(ctx.resolve("missing"), None);
    }

    #[test]
    fn rebinding_replaces() {
        let mut ctx = EvalContext::new().with("data", json!(1));
        ctx.set("data", json!(2));
        assert_eq!(ctx.resolve("data"), Some(&json!(2)));
    }
}
