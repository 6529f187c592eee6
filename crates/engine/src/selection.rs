//! Input resolution, edge-condition evaluation, and successor planning.
//!
//! Everything here mutates only the run [`Context`] and returns the
//! domain events and scheduling decisions for the engine to act on.

use gantry_core::NodeKey;
use gantry_events::DomainEvent;
use gantry_execution::{Context, ConvergenceDecision, ExecutionError};
use gantry_expression::{evaluate, evaluate_bool, EvalContext};
use gantry_workflow::{EdgeKind, NodeState};
use serde_json::Value;

/// The outcome of resolving a node's completion (or exhausted failure)
/// against its outgoing edges.
#[derive(Debug, Default)]
pub struct SuccessorPlan {
    /// Nodes to schedule, in edge declaration order.
    pub schedule: Vec<NodeKey>,
    /// Skip events produced by suppressed-subgraph propagation.
    pub events: Vec<DomainEvent>,
}

/// Resolve a node's input just before execution.
///
/// - Entry node (or triggered root): the run variables.
/// - Single predecessor: that predecessor's output (or its error payload
///   when a `failure` edge routed here).
/// - Convergence point (more than one declared predecessor): the map
///   `predecessor -> output` over settled predecessors. The shape is
///   structural: a merge whose sibling arms were suppressed still sees a
///   one-entry map, never the bare output.
///
/// A declared `input_mapping` then evaluates each entry and merges the
/// results over the base input.
pub fn resolve_input(ctx: &Context, node: &NodeKey) -> Value {
    let processed = ctx.processed().clone();
    let preds = processed.predecessors(node);

    let contributing: Vec<&NodeKey> = preds
        .iter()
        .filter(|pred| {
            matches!(
                ctx.node_record(pred).map(|r| r.state),
                Some(NodeState::Completed | NodeState::Failed)
            )
        })
        .collect();

    let base = if contributing.is_empty() {
        // Entry nodes — and a mid-graph trigger root whose predecessors
        // were settled as skipped — see the run variables.
        Value::Object(ctx.variables.clone())
    } else if processed.is_convergence_point(node) {
        let mut merged = serde_json::Map::new();
        for pred in &contributing {
            merged.insert(pred.to_string(), predecessor_output(ctx, pred));
        }
        Value::Object(merged)
    } else {
        predecessor_output(ctx, contributing[0])
    };

    apply_input_mapping(ctx, node, base)
}

/// A completed predecessor contributes its output; a failed one (reached
/// through a `failure` edge) contributes its error payload.
fn predecessor_output(ctx: &Context, pred: &NodeKey) -> Value {
    match ctx.node_record(pred) {
        Some(record) if record.state == NodeState::Failed => serde_json::json!({
            "error": record.error,
            "node": pred,
        }),
        Some(record) => record.output.clone().unwrap_or(Value::Null),
        None => Value::Null,
    }
}

fn apply_input_mapping(ctx: &Context, node: &NodeKey, base: Value) -> Value {
    let Some(mapping) = ctx
        .processed()
        .node(node)
        .and_then(|n| n.config.get("input_mapping"))
        .and_then(Value::as_object)
        .cloned()
    else {
        return base;
    };

    let eval_ctx = EvalContext::new()
        .with("input", base.clone())
        .with("data", base.clone())
        .with("variables", Value::Object(ctx.variables.clone()));

    let mut result = match base {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    for (field, expression) in &mapping {
        let Some(expression) = expression.as_str() else {
            continue;
        };
        match evaluate(expression, &eval_ctx) {
            Ok(value) => {
                result.insert(field.clone(), value);
            }
            Err(error) => {
                tracing::warn!(node = %node, field, %error, "input mapping entry failed");
            }
        }
    }
    Value::Object(result)
}

/// Evaluate a node's declared `output_mapping` into run-variable writes.
/// Only scalar results are written.
pub fn output_mapping_writes(
    ctx: &Context,
    node: &NodeKey,
    output: &Value,
) -> serde_json::Map<String, Value> {
    let mut writes = serde_json::Map::new();
    let Some(mapping) = ctx
        .processed()
        .node(node)
        .and_then(|n| n.config.get("output_mapping"))
        .and_then(Value::as_object)
    else {
        return writes;
    };

    let record_input = ctx
        .node_record(node)
        .and_then(|r| r.input.clone())
        .unwrap_or(Value::Null);
    let eval_ctx = EvalContext::new()
        .with("output", output.clone())
        .with("data", output.clone())
        .with("input", record_input)
        .with("variables", Value::Object(ctx.variables.clone()));

    for (variable, expression) in mapping {
        let Some(expression) = expression.as_str() else {
            continue;
        };
        match evaluate(expression, &eval_ctx) {
            Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))) => {
                writes.insert(variable.clone(), value);
            }
            Ok(_) => {
                tracing::warn!(node = %node, variable, "output mapping produced a non-scalar; skipped");
            }
            Err(error) => {
                tracing::warn!(node = %node, variable, %error, "output mapping entry failed");
            }
        }
    }
    writes
}

/// Plan the successors of `node` after it settled.
///
/// In normal mode (`failure_mode = false`) default edges fire subject to
/// their conditions and `failure` edges are suppressed; after an
/// exhausted failure the roles invert, with the error payload as the
/// condition's `output`.
pub fn plan_successors(
    ctx: &mut Context,
    node: &NodeKey,
    output: &Value,
    failure_mode: bool,
) -> Result<SuccessorPlan, ExecutionError> {
    let processed = ctx.processed().clone();
    let node_input = ctx
        .node_record(node)
        .and_then(|r| r.input.clone())
        .unwrap_or(Value::Null);

    // Aggregate per target: a target fires if any of its edges from this
    // node fired. Declaration order is preserved.
    let mut order: Vec<NodeKey> = Vec::new();
    let mut fired_by_target: std::collections::HashMap<NodeKey, bool> =
        std::collections::HashMap::new();
    for edge in processed.outgoing_edges(node) {
        let applicable = match edge.kind {
            EdgeKind::Default => !failure_mode,
            EdgeKind::Failure => failure_mode,
        };
        let fired = applicable && edge_condition_fires(edge.condition.as_deref(), ctx, &node_input, output, node);
        if !fired_by_target.contains_key(&edge.target) {
            order.push(edge.target.clone());
        }
        let slot = fired_by_target.entry(edge.target.clone()).or_insert(false);
        *slot = *slot || fired;
    }

    let mut plan = SuccessorPlan::default();
    for target in order {
        let fired = fired_by_target[&target];
        match ctx.resolve_predecessor(&target, node, fired)? {
            ConvergenceDecision::Schedule => plan.schedule.push(target),
            ConvergenceDecision::Skip => skip_cascade(ctx, &target, &mut plan)?,
            ConvergenceDecision::Wait => {}
        }
    }
    Ok(plan)
}

/// Record a suppressed edge `pred -> target` and act on the decision:
/// schedule a convergence whose other arm fired, or cascade a skip.
/// Used by the trigger path to settle edges from outside the triggered
/// subgraph.
pub fn resolve_suppression(
    ctx: &mut Context,
    target: &NodeKey,
    pred: &NodeKey,
    plan: &mut SuccessorPlan,
) -> Result<(), ExecutionError> {
    match ctx.resolve_predecessor(target, pred, false)? {
        ConvergenceDecision::Schedule => plan.schedule.push(target.clone()),
        ConvergenceDecision::Skip => skip_cascade(ctx, target, plan)?,
        ConvergenceDecision::Wait => {}
    }
    Ok(())
}

/// Skip a node and propagate the suppression through its successors.
/// Terminates because the graph is acyclic. A suppressed predecessor can
/// still complete a convergence set whose other edge fired, so the
/// cascade may also schedule.
fn skip_cascade(
    ctx: &mut Context,
    node: &NodeKey,
    plan: &mut SuccessorPlan,
) -> Result<(), ExecutionError> {
    // Already settled (e.g. a diamond whose two suppressed arms both
    // propagate here): nothing further.
    if ctx.node_record(node).is_some() {
        return Ok(());
    }
    plan.events.extend(ctx.skip_node(node, "all incoming edges suppressed")?);

    let processed = ctx.processed().clone();
    let successors: Vec<NodeKey> = processed.successors(node).to_vec();
    for target in successors {
        match ctx.resolve_predecessor(&target, node, false)? {
            ConvergenceDecision::Schedule => plan.schedule.push(target),
            ConvergenceDecision::Skip => skip_cascade(ctx, &target, plan)?,
            ConvergenceDecision::Wait => {}
        }
    }
    Ok(())
}

/// Evaluate an edge condition against `{input, output, data, variables}`.
/// Evaluation failures suppress the edge (logged, never fatal).
fn edge_condition_fires(
    condition: Option<&str>,
    ctx: &Context,
    node_input: &Value,
    output: &Value,
    node: &NodeKey,
) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    let eval_ctx = EvalContext::new()
        .with("input", node_input.clone())
        .with("output", output.clone())
        .with("data", output.clone())
        .with("variables", Value::Object(ctx.variables.clone()));
    match evaluate_bool(condition, &eval_ctx) {
        Ok(fired) => fired,
        Err(error) => {
            tracing::warn!(node = %node, condition, %error, "edge condition failed; suppressing edge");
            false
        }
    }
}
