//! Authored workflow shapes: nodes, edges, and the definition envelope.

use chrono::{DateTime, Utc};
use gantry_core::{NodeKey, TenantId, WorkflowId};
use serde::{Deserialize, Serialize};

/// A single node in an authored workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Author-assigned identifier, unique within the workflow.
    pub id: NodeKey,
    /// Strategy registry tag (e.g. `"http"`, `"transform"`, `"decision"`).
    #[serde(rename = "type")]
    pub node_type: String,
    /// Human-readable name.
    pub name: String,
    /// Free-form strategy configuration.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Canvas position. Advisory only; ignored by the execution core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl NodeDefinition {
    /// Create a node with an empty configuration.
    #[must_use]
    pub fn new(id: NodeKey, node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            name: name.into(),
            config: serde_json::Map::new(),
            position: None,
        }
    }

    /// Set a configuration entry, builder-style.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// Advisory canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// Distinguishes ordinary edges from error-handler edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Fires when the source node completes (subject to its condition).
    #[default]
    Default,
    /// Fires when the source node exhausts its retries; the error becomes
    /// the edge's output.
    Failure,
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node key.
    pub source: NodeKey,
    /// Target node key.
    pub target: NodeKey,
    /// Optional condition expression. Absence means the edge is
    /// unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Edge kind.
    #[serde(default)]
    pub kind: EdgeKind,
}

impl Edge {
    /// Create an unconditional default edge.
    #[must_use]
    pub fn new(source: NodeKey, target: NodeKey) -> Self {
        Self {
            source,
            target,
            condition: None,
            kind: EdgeKind::Default,
        }
    }

    /// Attach a condition expression, builder-style.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Mark this edge as an error-handler edge.
    #[must_use]
    pub fn failure(mut self) -> Self {
        self.kind = EdgeKind::Failure;
        self
    }
}

/// Lifecycle status of a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Editable; not yet triggerable.
    #[default]
    Draft,
    /// Published; external triggers are admitted.
    Published,
    /// Retired; kept for audit.
    Archived,
}

/// A stored workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique identifier.
    pub id: WorkflowId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Authored nodes.
    pub nodes: Vec<NodeDefinition>,
    /// Authored edges.
    pub edges: Vec<Edge>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: WorkflowStatus,
    /// Monotone version, bumped on every update.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Create a new draft definition at version 1.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        nodes: Vec<NodeDefinition>,
        edges: Vec<Edge>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::v4(),
            tenant_id,
            name: name.into(),
            description: None,
            nodes,
            edges,
            tags: Vec::new(),
            status: WorkflowStatus::Draft,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a node by key.
    #[must_use]
    pub fn node(&self, key: &NodeKey) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| &n.id == key)
    }

    /// Returns `true` if the definition contains the given node.
    #[must_use]
    pub fn contains_node(&self, key: &NodeKey) -> bool {
        self.node(key).is_some()
    }
}
