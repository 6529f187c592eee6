//! Workflow validation errors.

use gantry_core::NodeKey;
use thiserror::Error;

/// Errors produced while validating or processing a workflow graph.
///
/// Each variant corresponds to one structural invariant; processing fails
/// with the first violated invariant and no partial state escapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Two nodes share the same key.
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeKey),

    /// An edge references a node that does not exist.
    #[error("edge references unknown node {node} (as {side})")]
    UnknownEdgeEndpoint {
        /// The missing node key.
        node: NodeKey,
        /// Which side of the edge referenced it (`"source"` or `"target"`).
        side: &'static str,
    },

    /// An edge connects a node to itself.
    #[error("self-edge on node {0}")]
    SelfEdge(NodeKey),

    /// The graph has no entry node (every node has a predecessor).
    #[error("workflow has no entry node")]
    NoEntryNode,

    /// The graph has no exit node (every node has a successor).
    #[error("workflow has no exit node")]
    NoExitNode,

    /// The graph contains a cycle.
    #[error("cycle detected involving nodes: {}", format_keys(.0))]
    CycleDetected(Vec<NodeKey>),

    /// Nodes that appear on no entry-to-exit path.
    #[error("unreachable nodes: {}", format_keys(.0))]
    UnreachableNodes(Vec<NodeKey>),

    /// The workflow has no nodes at all.
    #[error("workflow has no nodes")]
    Empty,
}

fn format_keys(keys: &[NodeKey]) -> String {
    keys.iter()
        .map(NodeKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_lists_nodes() {
        let err = WorkflowError::CycleDetected(vec![
            NodeKey::new("a").unwrap(),
            NodeKey::new("b").unwrap(),
        ]);
        assert_eq!(err.to_string(), "cycle detected involving nodes: a, b");
    }

    #[test]
    fn unreachable_error_lists_nodes() {
        let err = WorkflowError::UnreachableNodes(vec![NodeKey::new("orphan").unwrap()]);
        assert_eq!(err.to_string(), "unreachable nodes: orphan");
    }

    #[test]
    fn endpoint_error_names_side() {
        let err = WorkflowError::UnknownEdgeEndpoint {
            node: NodeKey::new("ghost").unwrap(),
            side: "target",
        };
        assert!(err.to_string().contains("ghost"));
        assert!(err.to_string().contains("target"));
    }
}
