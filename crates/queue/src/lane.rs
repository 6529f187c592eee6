//! Static node-type to lane routing.

use std::collections::HashMap;

/// The lane used for node types without an explicit mapping.
pub const DEFAULT_LANE: &str = "default";

/// Static mapping from node type to queue lane.
#[derive(Debug, Clone)]
pub struct LaneMap {
    lanes: HashMap<String, String>,
}

impl LaneMap {
    /// The built-in mapping: each built-in node type gets its own lane.
    #[must_use]
    pub fn builtin() -> Self {
        let mut lanes = HashMap::new();
        for node_type in ["http", "transform", "decision", "delay", "webhook", "agent"] {
            lanes.insert(node_type.to_string(), node_type.to_string());
        }
        Self { lanes }
    }

    /// An empty mapping: everything routes to `default`.
    #[must_use]
    pub fn empty() -> Self {
        Self { lanes: HashMap::new() }
    }

    /// Add or replace a mapping, builder-style.
    #[must_use]
    pub fn with(mut self, node_type: impl Into<String>, lane: impl Into<String>) -> Self {
        self.lanes.insert(node_type.into(), lane.into());
        self
    }

    /// Resolve the lane for a node type.
    #[must_use]
    pub fn lane_for(&self, node_type: &str) -> &str {
        self.lanes.get(node_type).map_or(DEFAULT_LANE, String::as_str)
    }

    /// All lane names this map can route to, including `default`.
    #[must_use]
    pub fn lane_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lanes.values().cloned().collect();
        names.push(DEFAULT_LANE.to_string());
        names.sort();
        names.dedup();
        names
    }
}

impl Default for LaneMap {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_types_have_own_lanes() {
        let map = LaneMap::builtin();
        assert_eq!(map.lane_for("http"), "http");
        assert_eq!(map.lane_for("transform"), "transform");
        assert_eq!(map.lane_for("custom-thing"), DEFAULT_LANE);
    }

    #[test]
    fn custom_mapping_overrides() {
        let map = LaneMap::empty().with("http", "slow-io");
        assert_eq!(map.lane_for("http"), "slow-io");
        assert_eq!(map.lane_for("transform"), DEFAULT_LANE);
    }

    #[test]
    fn lane_names_include_default_once() {
        let map = LaneMap::empty().with("a", "x").with("b", "x");
        let names = map.lane_names();
        assert_eq!(names, vec!["default".to_string(), "x".to_string()]);
    }
}
