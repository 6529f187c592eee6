//! Graph processing — turns an authored node/edge list into derived,
//! immutable DAG metadata.
//!
//! Invariants enforced here, in order:
//! 1. node keys are unique,
//! 2. every edge endpoint refers to a known node,
//! 3. no self-edges,
//! 4. at least one entry and one exit node,
//! 5. the graph is acyclic,
//! 6. every node lies on some entry-to-exit path.
//!
//! All failures are reported synchronously; no partial state escapes.

use std::collections::{HashMap, HashSet, VecDeque};

use gantry_core::NodeKey;

use crate::definition::{Edge, NodeDefinition};
use crate::error::WorkflowError;

/// Derived, immutable DAG metadata for a workflow.
///
/// Successor iteration order follows edge declaration order (first-seen,
/// deduplicated) — path enumeration stays deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedWorkflow {
    nodes: HashMap<NodeKey, NodeDefinition>,
    edges: Vec<Edge>,
    adjacency: HashMap<NodeKey, Vec<NodeKey>>,
    reverse_adjacency: HashMap<NodeKey, Vec<NodeKey>>,
    entry: Vec<NodeKey>,
    exit: Vec<NodeKey>,
    branch_points: Vec<NodeKey>,
    convergence_points: HashMap<NodeKey, Vec<NodeKey>>,
    parallel_groups: Vec<Vec<NodeKey>>,
    topo_order: Vec<NodeKey>,
    depth: HashMap<NodeKey, usize>,
}

impl ProcessedWorkflow {
    /// Process an authored node/edge list into DAG metadata.
    pub fn process(nodes: Vec<NodeDefinition>, edges: Vec<Edge>) -> Result<Self, WorkflowError> {
        if nodes.is_empty() {
            return Err(WorkflowError::Empty);
        }

        // 1. Unique node keys.
        let mut node_map: HashMap<NodeKey, NodeDefinition> = HashMap::with_capacity(nodes.len());
        for node in nodes {
            if node_map.contains_key(&node.id) {
                return Err(WorkflowError::DuplicateNode(node.id));
            }
            node_map.insert(node.id.clone(), node);
        }

        // 2. + 3. Edge endpoints and self-edges.
        for edge in &edges {
            if !node_map.contains_key(&edge.source) {
                return Err(WorkflowError::UnknownEdgeEndpoint {
                    node: edge.source.clone(),
                    side: "source",
                });
            }
            if !node_map.contains_key(&edge.target) {
                return Err(WorkflowError::UnknownEdgeEndpoint {
                    node: edge.target.clone(),
                    side: "target",
                });
            }
            if edge.source == edge.target {
                return Err(WorkflowError::SelfEdge(edge.source.clone()));
            }
        }

        // Adjacency in first-seen edge order, deduplicated.
        let mut adjacency: HashMap<NodeKey, Vec<NodeKey>> = HashMap::with_capacity(node_map.len());
        let mut reverse_adjacency: HashMap<NodeKey, Vec<NodeKey>> =
            HashMap::with_capacity(node_map.len());
        for key in node_map.keys() {
            adjacency.insert(key.clone(), Vec::new());
            reverse_adjacency.insert(key.clone(), Vec::new());
        }
        for edge in &edges {
            let succ = adjacency
                .get_mut(&edge.source)
                .unwrap_or_else(|| unreachable!("endpoints validated above"));
            if !succ.contains(&edge.target) {
                succ.push(edge.target.clone());
            }
            let pred = reverse_adjacency
                .get_mut(&edge.target)
                .unwrap_or_else(|| unreachable!("endpoints validated above"));
            if !pred.contains(&edge.source) {
                pred.push(edge.source.clone());
            }
        }

        // 4. Entry and exit sets, lexicographically ordered.
        let mut entry: Vec<NodeKey> = reverse_adjacency
            .iter()
            .filter(|(_, preds)| preds.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        entry.sort();
        let mut exit: Vec<NodeKey> = adjacency
            .iter()
            .filter(|(_, succs)| succs.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        exit.sort();
        if entry.is_empty() {
            return Err(WorkflowError::NoEntryNode);
        }
        if exit.is_empty() {
            return Err(WorkflowError::NoExitNode);
        }

        // 5. Cycle detection: DFS with tri-color marking.
        detect_cycle(&adjacency)?;

        // 6. Reachability: forward from entries ∪ reverse from exits.
        let forward = reach(&adjacency, &entry);
        let backward = reach(&reverse_adjacency, &exit);
        let mut unreachable: Vec<NodeKey> = node_map
            .keys()
            .filter(|k| !forward.contains(*k) || !backward.contains(*k))
            .cloned()
            .collect();
        if !unreachable.is_empty() {
            unreachable.sort();
            return Err(WorkflowError::UnreachableNodes(unreachable));
        }

        // Depth: longest distance from any entry.
        let depth = compute_depth(&adjacency, &reverse_adjacency, &entry);

        // Branch and convergence points from successor/predecessor cardinality.
        let mut branch_points: Vec<NodeKey> = adjacency
            .iter()
            .filter(|(_, succs)| succs.len() > 1)
            .map(|(k, _)| k.clone())
            .collect();
        branch_points.sort();
        let convergence_points: HashMap<NodeKey, Vec<NodeKey>> = reverse_adjacency
            .iter()
            .filter(|(_, preds)| preds.len() > 1)
            .map(|(k, preds)| (k.clone(), preds.clone()))
            .collect();

        // Parallel groups: iterative layering. A node joins the layer once
        // every predecessor sits in an already-emitted layer; the initial
        // layer is the entry set. Ties break by depth, then by key.
        let parallel_groups = layer(&adjacency, &reverse_adjacency, &depth, node_map.len());
        let topo_order: Vec<NodeKey> = parallel_groups.iter().flatten().cloned().collect();

        Ok(Self {
            nodes: node_map,
            edges,
            adjacency,
            reverse_adjacency,
            entry,
            exit,
            branch_points,
            convergence_points,
            parallel_groups,
            topo_order,
            depth,
        })
    }

    /// Look up a node definition.
    #[must_use]
    pub fn node(&self, key: &NodeKey) -> Option<&NodeDefinition> {
        self.nodes.get(key)
    }

    /// All node definitions, keyed by node key.
    #[must_use]
    pub fn nodes(&self) -> &HashMap<NodeKey, NodeDefinition> {
        &self.nodes
    }

    /// Successors of a node, in edge declaration order.
    #[must_use]
    pub fn successors(&self, key: &NodeKey) -> &[NodeKey] {
        self.adjacency.get(key).map_or(&[], Vec::as_slice)
    }

    /// Predecessors of a node, in edge declaration order.
    #[must_use]
    pub fn predecessors(&self, key: &NodeKey) -> &[NodeKey] {
        self.reverse_adjacency.get(key).map_or(&[], Vec::as_slice)
    }

    /// Outgoing edges of a node, in declaration order.
    pub fn outgoing_edges<'s, 'k>(
        &'s self,
        key: &'k NodeKey,
    ) -> impl Iterator<Item = &'s Edge> + use<'s, 'k> {
        self.edges.iter().filter(move |e| &e.source == key)
    }

    /// Incoming edges of a node, in declaration order.
    pub fn incoming_edges<'s, 'k>(
        &'s self,
        key: &'k NodeKey,
    ) -> impl Iterator<Item = &'s Edge> + use<'s, 'k> {
        self.edges.iter().filter(move |e| &e.target == key)
    }

    /// Entry nodes (no predecessors), lexicographically ordered.
    #[must_use]
    pub fn entry_nodes(&self) -> &[NodeKey] {
        &self.entry
    }

    /// Exit nodes (no successors), lexicographically ordered.
    #[must_use]
    pub fn exit_nodes(&self) -> &[NodeKey] {
        &self.exit
    }

    /// Nodes with more than one successor.
    #[must_use]
    pub fn branch_points(&self) -> &[NodeKey] {
        &self.branch_points
    }

    /// Convergence nodes mapped to their required predecessors.
    #[must_use]
    pub fn convergence_points(&self) -> &HashMap<NodeKey, Vec<NodeKey>> {
        &self.convergence_points
    }

    /// Returns `true` if the node waits on more than one predecessor.
    #[must_use]
    pub fn is_convergence_point(&self, key: &NodeKey) -> bool {
        self.convergence_points.contains_key(key)
    }

    /// Topological layering: nodes in the same group have no dependency on
    /// each other.
    #[must_use]
    pub fn parallel_groups(&self) -> &[Vec<NodeKey>] {
        &self.parallel_groups
    }

    /// A topological order consistent with the adjacency.
    #[must_use]
    pub fn topo_order(&self) -> &[NodeKey] {
        &self.topo_order
    }

    /// Longest distance from any entry node.
    #[must_use]
    pub fn depth(&self, key: &NodeKey) -> Option<usize> {
        self.depth.get(key).copied()
    }

    /// Number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The set of nodes reachable from `start` (inclusive).
    #[must_use]
    pub fn reachable_from(&self, start: &NodeKey) -> HashSet<NodeKey> {
        reach(&self.adjacency, std::slice::from_ref(start))
    }
}

/// DFS with tri-color marking. White = unvisited, grey = on the current
/// stack, black = finished. A grey→grey edge closes a cycle; the error
/// carries the nodes on the offending stack segment.
fn detect_cycle(adjacency: &HashMap<NodeKey, Vec<NodeKey>>) -> Result<(), WorkflowError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Grey,
        Black,
    }

    let mut color: HashMap<&NodeKey, Color> =
        adjacency.keys().map(|k| (k, Color::White)).collect();

    let mut roots: Vec<&NodeKey> = adjacency.keys().collect();
    roots.sort();

    for root in roots {
        if color[root] != Color::White {
            continue;
        }
        // Iterative DFS; stack holds (node, next-successor-index).
        let mut stack: Vec<(&NodeKey, usize)> = vec![(root, 0)];
        color.insert(root, Color::Grey);

        while let Some(&(node, idx)) = stack.last() {
            let succs = &adjacency[node];
            if idx < succs.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let next = &succs[idx];
                match color[next] {
                    Color::White => {
                        color.insert(next, Color::Grey);
                        stack.push((next, 0));
                    }
                    Color::Grey => {
                        let mut cycle: Vec<NodeKey> = stack
                            .iter()
                            .skip_while(|(n, _)| *n != next)
                            .map(|(n, _)| (*n).clone())
                            .collect();
                        cycle.sort();
                        return Err(WorkflowError::CycleDetected(cycle));
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(node, Color::Black);
                stack.pop();
            }
        }
    }
    Ok(())
}

/// BFS over `adjacency` from the given start set; returns the visited set.
fn reach(adjacency: &HashMap<NodeKey, Vec<NodeKey>>, starts: &[NodeKey]) -> HashSet<NodeKey> {
    let mut seen: HashSet<NodeKey> = starts.iter().cloned().collect();
    let mut queue: VecDeque<&NodeKey> = starts.iter().collect();
    while let Some(node) = queue.pop_front() {
        for next in adjacency.get(node).map_or(&[][..], Vec::as_slice) {
            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }
    seen
}

/// `depth(n) = max over predecessors + 1`, entries at 0. Computed by BFS in
/// dependency order (acyclicity already established).
fn compute_depth(
    adjacency: &HashMap<NodeKey, Vec<NodeKey>>,
    reverse: &HashMap<NodeKey, Vec<NodeKey>>,
    entry: &[NodeKey],
) -> HashMap<NodeKey, usize> {
    let mut remaining: HashMap<&NodeKey, usize> =
        reverse.iter().map(|(k, preds)| (k, preds.len())).collect();
    let mut depth: HashMap<NodeKey, usize> = entry.iter().map(|k| (k.clone(), 0)).collect();
    let mut queue: VecDeque<&NodeKey> = entry.iter().collect();

    while let Some(node) = queue.pop_front() {
        let d = depth[node];
        for next in &adjacency[node] {
            let next_depth = depth.entry(next.clone()).or_insert(0);
            *next_depth = (*next_depth).max(d + 1);
            let count = remaining
                .get_mut(next)
                .unwrap_or_else(|| unreachable!("adjacency and reverse cover the same nodes"));
            *count -= 1;
            if *count == 0 {
                queue.push_back(next);
            }
        }
    }
    depth
}

/// Kahn layering with deterministic ordering: each group holds the nodes
/// whose predecessors all sit in already-emitted groups, sorted by depth
/// then key.
fn layer(
    adjacency: &HashMap<NodeKey, Vec<NodeKey>>,
    reverse: &HashMap<NodeKey, Vec<NodeKey>>,
    depth: &HashMap<NodeKey, usize>,
    node_count: usize,
) -> Vec<Vec<NodeKey>> {
    let mut remaining: HashMap<&NodeKey, usize> =
        reverse.iter().map(|(k, preds)| (k, preds.len())).collect();
    let mut current: Vec<NodeKey> = remaining
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(k, _)| (*k).clone())
        .collect();

    let mut groups = Vec::new();
    let mut emitted = 0;
    while !current.is_empty() {
        current.sort_by(|a, b| depth[a].cmp(&depth[b]).then_with(|| a.cmp(b)));
        let mut next = Vec::new();
        for node in &current {
            for succ in &adjacency[node] {
                let count = remaining
                    .get_mut(succ)
                    .unwrap_or_else(|| unreachable!("adjacency and reverse cover the same nodes"));
                *count -= 1;
                if *count == 0 {
                    next.push(succ.clone());
                }
            }
        }
        emitted += current.len();
        groups.push(std::mem::replace(&mut current, next));
    }
    debug_assert_eq!(emitted, node_count, "acyclicity established before layering");
    groups
}


#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    /// Generate a random DAG by only drawing edges from lower to higher
    /// indices, then check that the computed topological order is a linear
    /// extension of the adjacency.
    fn arb_dag() -> impl Strategy<Value = (Vec<NodeDefinition>, Vec<Edge>)> {
        (2usize..10).prop_flat_map(|n| {
            let nodes: Vec<NodeDefinition> = (0..n)
                .map(|i| {
                    NodeDefinition::new(
                        NodeKey::new(format!("n{i:02}")).unwrap(),
                        "transform",
                        format!("n{i:02}"),
                    )
                })
                .collect();
            let pairs: Vec<(usize, usize)> = (0..n)
                .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
                .collect();
            proptest::sample::subsequence(pairs.clone(), 0..=pairs.len()).prop_map(move |chosen| {
                let edges = chosen
                    .into_iter()
                    .map(|(i, j)| {
                        Edge::new(
                            NodeKey::new(format!("n{i:02}")).unwrap(),
                            NodeKey::new(format!("n{j:02}")).unwrap(),
                        )
                    })
                    .collect();
                (nodes.clone(), edges)
            })
        })
    }

    proptest! {
        #[test]
        fn topo_order_is_linear_extension_of_adjacency((nodes, edges) in arb_dag()) {
            // Random DAGs may violate reachability; only fully-connected
            // results are inspected. Structural errors are themselves fine.
            if let Ok(wf) = ProcessedWorkflow::process(nodes, edges.clone()) {
                let pos: std::collections::HashMap<&NodeKey, usize> = wf
                    .topo_order()
                    .iter()
                    .enumerate()
                    .map(|(i, k)| (k, i))
                    .collect();
                for e in &edges {
                    prop_assert!(pos[&e.source] < pos[&e.target]);
                }
                // Every node appears exactly once.
                prop_assert_eq!(wf.topo_order().len(), wf.node_count());
            }
        }
    }
}
