//! The per-run context and its transition functions.
//!
//! Every transition validates itself, mutates the context, appends to the
//! history log, and returns the domain events to publish. The engine owns
//! the only live reference and serializes all transitions per run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gantry_core::{ExecutionId, NodeKey, TenantId, TriggerId, WorkflowId};
use gantry_events::{names, DomainEvent};
use gantry_workflow::{NodeState, ProcessedWorkflow};
use serde_json::Value;

use crate::config::RunConfig;
use crate::error::ExecutionError;
use crate::history::HistoryEntry;
use crate::record::NodeRunRecord;
use crate::status::ExecutionStatus;
use crate::transition::{validate_execution_transition, validate_node_transition};

/// What the engine should do with a successor after an incoming edge
/// resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceDecision {
    /// Every required predecessor resolved and at least one edge fired.
    Schedule,
    /// Every required predecessor resolved and every edge was suppressed.
    Skip,
    /// Some required predecessor is still outstanding.
    Wait,
}

/// A node completion whose successor scheduling was deferred by a pause.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredCompletion {
    /// The completed node.
    pub node: NodeKey,
    /// Its output.
    pub output: Value,
}

/// A failed node attempt, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeError {
    /// Sanitized error message.
    pub message: String,
    /// Whether the strategy declared the error retryable.
    pub retryable: bool,
}

/// The state of one workflow run.
#[derive(Debug, Clone)]
pub struct Context {
    /// Unique run id.
    pub execution_id: ExecutionId,
    /// The workflow being run.
    pub workflow_id: WorkflowId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The trigger that created this run (used for deduplication).
    pub trigger_id: TriggerId,
    /// Run-level state.
    pub state: ExecutionStatus,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub ended_at: Option<DateTime<Utc>>,
    /// Run-level error, if failed.
    pub error: Option<String>,
    /// Run variables, seeded from the trigger input.
    pub variables: serde_json::Map<String, Value>,
    /// Retry/timeout budgets.
    pub config: RunConfig,
    processed: Arc<ProcessedWorkflow>,
    node_records: HashMap<NodeKey, NodeRunRecord>,
    scheduled: HashSet<NodeKey>,
    /// Convergence bookkeeping: target -> predecessor -> edge fired.
    convergence: HashMap<NodeKey, HashMap<NodeKey, bool>>,
    deferred: Vec<DeferredCompletion>,
    history: Vec<HistoryEntry>,
}

impl Context {
    /// Create a run in the `Created` state.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        trigger_id: TriggerId,
        processed: Arc<ProcessedWorkflow>,
        variables: serde_json::Map<String, Value>,
        config: RunConfig,
    ) -> Self {
        Self {
            execution_id: ExecutionId::v4(),
            workflow_id,
            tenant_id,
            trigger_id,
            state: ExecutionStatus::Created,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
            variables,
            config,
            processed,
            node_records: HashMap::new(),
            scheduled: HashSet::new(),
            convergence: HashMap::new(),
            deferred: Vec::new(),
            history: Vec::new(),
        }
    }

    /// The processed DAG this run executes.
    #[must_use]
    pub fn processed(&self) -> &Arc<ProcessedWorkflow> {
        &self.processed
    }

    /// A node's run record, if one exists yet.
    #[must_use]
    pub fn node_record(&self, node: &NodeKey) -> Option<&NodeRunRecord> {
        self.node_records.get(node)
    }

    /// All node records.
    #[must_use]
    pub fn node_records(&self) -> &HashMap<NodeKey, NodeRunRecord> {
        &self.node_records
    }

    /// Nodes scheduled but not yet settled.
    #[must_use]
    pub fn scheduled(&self) -> &HashSet<NodeKey> {
        &self.scheduled
    }

    /// The append-only history log.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    // ── Run-level transitions ───────────────────────────────────────────

    /// `Created -> Running`.
    pub fn start(&mut self) -> Result<Vec<DomainEvent>, ExecutionError> {
        self.transition_run(ExecutionStatus::Running)?;
        self.log("workflow", "started", None);
        Ok(vec![self.run_event(
            names::WORKFLOW_STARTED,
            serde_json::json!({
                "variables": self.variables,
                "trigger_id": self.trigger_id,
            }),
        )])
    }

    /// `Running -> Paused`.
    pub fn pause(&mut self) -> Result<Vec<DomainEvent>, ExecutionError> {
        self.transition_run(ExecutionStatus::Paused)?;
        self.log("workflow", "paused", None);
        Ok(vec![self.run_event(names::WORKFLOW_PAUSED, serde_json::json!({}))])
    }

    /// `Paused -> Running`.
    pub fn resume(&mut self) -> Result<Vec<DomainEvent>, ExecutionError> {
        if self.state != ExecutionStatus::Paused {
            return Err(ExecutionError::InvalidTransition {
                entity: "workflow".into(),
                from: self.state.to_string(),
                to: ExecutionStatus::Running.to_string(),
            });
        }
        self.state = ExecutionStatus::Running;
        self.log("workflow", "resumed", None);
        Ok(vec![self.run_event(names::WORKFLOW_RESUMED, serde_json::json!({}))])
    }

    /// `Running -> Completed`.
    pub fn complete(&mut self) -> Result<Vec<DomainEvent>, ExecutionError> {
        self.transition_run(ExecutionStatus::Completed)?;
        self.ended_at = Some(Utc::now());
        self.log("workflow", "completed", None);
        Ok(vec![self.run_event(
            names::WORKFLOW_COMPLETED,
            serde_json::json!({"duration_ms": self.duration_ms()}),
        )])
    }

    /// `Running | Paused -> Failed`.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<Vec<DomainEvent>, ExecutionError> {
        self.transition_run(ExecutionStatus::Failed)?;
        let error = error.into();
        self.ended_at = Some(Utc::now());
        self.error = Some(error.clone());
        self.log("workflow", "failed", Some(serde_json::json!({"error": error})));
        Ok(vec![self.run_event(
            names::WORKFLOW_FAILED,
            serde_json::json!({"error": error, "duration_ms": self.duration_ms()}),
        )])
    }

    /// `Running | Paused -> Cancelled`.
    ///
    /// Cancels every node still in `Pending` or `Running`. Returns the
    /// events to publish and the nodes that were `Running` (the engine
    /// invokes strategy cleanup for those).
    pub fn cancel(&mut self) -> Result<(Vec<DomainEvent>, Vec<NodeKey>), ExecutionError> {
        self.transition_run(ExecutionStatus::Cancelled)?;
        self.ended_at = Some(Utc::now());

        let mut events = Vec::new();
        let mut was_running = Vec::new();
        let mut keys: Vec<NodeKey> = self.node_records.keys().cloned().collect();
        keys.sort();
        for key in keys {
            let record = self
                .node_records
                .get_mut(&key)
                .unwrap_or_else(|| unreachable!("key drawn from the map"));
            if matches!(record.state, NodeState::Pending | NodeState::Running) {
                if record.state == NodeState::Running {
                    was_running.push(key.clone());
                }
                record.state = NodeState::Cancelled;
                record.ended_at = Some(Utc::now());
                self.scheduled.remove(&key);
                events.push(
                    self.run_event(names::NODE_CANCELLED, serde_json::json!({}))
                        .with_node(key.clone()),
                );
            }
        }
        self.scheduled.clear();
        self.log("workflow", "cancelled", None);
        events.push(self.run_event(
            names::WORKFLOW_CANCELLED,
            serde_json::json!({"duration_ms": self.duration_ms()}),
        ));
        Ok((events, was_running))
    }

    // ── Node-level transitions ──────────────────────────────────────────

    /// First-time scheduling of a node: creates its record and enqueues
    /// attempt 1.
    pub fn schedule_node(&mut self, node: &NodeKey) -> Result<Vec<DomainEvent>, ExecutionError> {
        self.require_known(node)?;
        if self.state != ExecutionStatus::Running {
            return Err(ExecutionError::InvalidTransition {
                entity: "node".into(),
                from: self.state.to_string(),
                to: "scheduled".into(),
            });
        }
        if self.node_records.contains_key(node) {
            return Err(ExecutionError::AlreadyScheduled(node.clone()));
        }
        self.node_records.insert(node.clone(), NodeRunRecord::new());
        self.scheduled.insert(node.clone());
        self.log_node(node, "scheduled", Some(serde_json::json!({"attempt": 1})));
        Ok(vec![self
            .run_event(names::NODE_SCHEDULED, serde_json::json!({"attempt": 1}))
            .with_node(node.clone())])
    }

    /// Retry scheduling: `Failed -> Pending` with `retry_count + 1`.
    pub fn retry_node(&mut self, node: &NodeKey) -> Result<Vec<DomainEvent>, ExecutionError> {
        self.require_known(node)?;
        let record = self
            .node_records
            .get_mut(node)
            .ok_or_else(|| ExecutionError::NodeNotFound(node.clone()))?;
        validate_node_transition(record.state, NodeState::Pending)?;
        record.state = NodeState::Pending;
        record.retry_count += 1;
        let attempt = record.next_attempt_number();
        self.scheduled.insert(node.clone());
        self.log_node(node, "scheduled", Some(serde_json::json!({"attempt": attempt})));
        Ok(vec![self
            .run_event(names::NODE_SCHEDULED, serde_json::json!({"attempt": attempt}))
            .with_node(node.clone())])
    }

    /// `Pending -> Running`, opening a new attempt.
    pub fn start_node(
        &mut self,
        node: &NodeKey,
        input: Value,
    ) -> Result<Vec<DomainEvent>, ExecutionError> {
        let record = self
            .node_records
            .get_mut(node)
            .ok_or_else(|| ExecutionError::NodeNotFound(node.clone()))?;
        validate_node_transition(record.state, NodeState::Running)?;
        record.state = NodeState::Running;
        let attempt = record.next_attempt_number();
        record.attempts.push(crate::attempt::NodeAttempt::new(attempt));
        record.input = Some(input.clone());
        if record.started_at.is_none() {
            record.started_at = Some(Utc::now());
        }
        self.log_node(node, "started", Some(serde_json::json!({"attempt": attempt})));
        Ok(vec![self
            .run_event(
                names::NODE_STARTED,
                serde_json::json!({"attempt": attempt, "input": input}),
            )
            .with_node(node.clone())])
    }

    /// `Running -> Completed`, applying output-mapping variable writes.
    pub fn complete_node(
        &mut self,
        node: &NodeKey,
        output: Value,
        variable_writes: serde_json::Map<String, Value>,
    ) -> Result<Vec<DomainEvent>, ExecutionError> {
        let record = self
            .node_records
            .get_mut(node)
            .ok_or_else(|| ExecutionError::NodeNotFound(node.clone()))?;
        validate_node_transition(record.state, NodeState::Completed)?;
        record.state = NodeState::Completed;
        record.output = Some(output.clone());
        record.error = None;
        record.ended_at = Some(Utc::now());
        if let Some(attempt) = record.latest_attempt_mut() {
            attempt.complete_success(output.clone());
        }
        let duration_ms = record
            .latest_attempt()
            .and_then(crate::attempt::NodeAttempt::duration)
            .map(|d| d.as_millis() as u64);
        self.scheduled.remove(node);
        for (key, value) in &variable_writes {
            self.variables.insert(key.clone(), value.clone());
        }
        self.log_node(node, "completed", None);
        Ok(vec![self
            .run_event(
                names::NODE_COMPLETED,
                serde_json::json!({
                    "output": output,
                    "duration_ms": duration_ms,
                    "variable_writes": variable_writes,
                }),
            )
            .with_node(node.clone())])
    }

    /// `Running -> Failed` for one attempt.
    pub fn fail_node(
        &mut self,
        node: &NodeKey,
        error: &NodeError,
    ) -> Result<Vec<DomainEvent>, ExecutionError> {
        let record = self
            .node_records
            .get_mut(node)
            .ok_or_else(|| ExecutionError::NodeNotFound(node.clone()))?;
        validate_node_transition(record.state, NodeState::Failed)?;
        record.state = NodeState::Failed;
        record.error = Some(error.message.clone());
        record.ended_at = Some(Utc::now());
        if let Some(attempt) = record.latest_attempt_mut() {
            attempt.complete_failure(&error.message);
        }
        let attempt = record.next_attempt_number();
        self.scheduled.remove(node);
        self.log_node(
            node,
            "failed",
            Some(serde_json::json!({"error": error.message, "attempt": attempt})),
        );
        Ok(vec![self
            .run_event(
                names::NODE_FAILED,
                serde_json::json!({
                    "error": error.message,
                    "attempt": attempt,
                    "retryable": error.retryable,
                }),
            )
            .with_node(node.clone())])
    }

    /// Mark a node `Skipped`. Creates the record if the node never
    /// scheduled (suppressed before first schedule, or outside the
    /// triggered subgraph).
    pub fn skip_node(
        &mut self,
        node: &NodeKey,
        reason: &str,
    ) -> Result<Vec<DomainEvent>, ExecutionError> {
        self.require_known(node)?;
        let record = self.node_records.entry(node.clone()).or_default();
        validate_node_transition(record.state, NodeState::Skipped)?;
        record.state = NodeState::Skipped;
        record.ended_at = Some(Utc::now());
        self.scheduled.remove(node);
        self.log_node(node, "skipped", Some(serde_json::json!({"reason": reason})));
        Ok(vec![self
            .run_event(names::NODE_SKIPPED, serde_json::json!({"reason": reason}))
            .with_node(node.clone())])
    }

    // ── Convergence ─────────────────────────────────────────────────────

    /// Record that the edge `pred -> target` resolved (fired or
    /// definitively suppressed), and decide what to do with `target`.
    ///
    /// Non-convergence targets resolve immediately. Convergence targets
    /// wait until every required predecessor has resolved; they schedule
    /// at most once per run (the first deciding call wins).
    pub fn resolve_predecessor(
        &mut self,
        target: &NodeKey,
        pred: &NodeKey,
        fired: bool,
    ) -> Result<ConvergenceDecision, ExecutionError> {
        self.require_known(target)?;
        if !self.processed.is_convergence_point(target) {
            return Ok(if fired {
                ConvergenceDecision::Schedule
            } else {
                ConvergenceDecision::Skip
            });
        }

        // Already settled (scheduled or skipped earlier): nothing to do.
        if self.node_records.contains_key(target) {
            return Ok(ConvergenceDecision::Wait);
        }

        let resolutions = self.convergence.entry(target.clone()).or_default();
        resolutions.insert(pred.clone(), fired);

        let required = self
            .processed
            .convergence_points()
            .get(target)
            .cloned()
            .unwrap_or_default();
        let resolutions = &self.convergence[target];
        if required.iter().all(|p| resolutions.contains_key(p)) {
            if required.iter().any(|p| resolutions.get(p) == Some(&true)) {
                Ok(ConvergenceDecision::Schedule)
            } else {
                Ok(ConvergenceDecision::Skip)
            }
        } else {
            Ok(ConvergenceDecision::Wait)
        }
    }

    // ── Pause bookkeeping ───────────────────────────────────────────────

    /// Defer a completion's successor scheduling until resume.
    pub fn defer_completion(&mut self, node: NodeKey, output: Value) {
        self.deferred.push(DeferredCompletion { node, output });
    }

    /// Drain the deferred completions (called on resume).
    pub fn take_deferred(&mut self) -> Vec<DeferredCompletion> {
        std::mem::take(&mut self.deferred)
    }

    // ── Policy helpers ──────────────────────────────────────────────────

    /// Max retries for a node: its `max_retries` config override, or the
    /// run default.
    #[must_use]
    pub fn effective_max_retries(&self, node: &NodeKey) -> u32 {
        self.processed
            .node(node)
            .and_then(|n| n.config.get("max_retries"))
            .and_then(Value::as_u64)
            .map_or(self.config.max_retries, |v| v as u32)
    }

    /// Timeout for a node: its `timeout_ms` config override, or the run
    /// default.
    #[must_use]
    pub fn node_timeout(&self, node: &NodeKey) -> Duration {
        self.processed
            .node(node)
            .and_then(|n| n.config.get("timeout_ms"))
            .and_then(Value::as_u64)
            .map_or(self.config.timeout, Duration::from_millis)
    }

    /// Whether the retry policy permits another attempt for this node.
    #[must_use]
    pub fn can_retry(&self, node: &NodeKey, retryable: bool) -> bool {
        retryable
            && self
                .node_record(node)
                .is_some_and(|r| r.retry_count < self.effective_max_retries(node))
    }

    /// Whether a dequeued job still matches the live state: the node is
    /// `Pending` and the attempt number is current.
    #[must_use]
    pub fn is_pending_attempt(&self, node: &NodeKey, attempt: u32) -> bool {
        self.node_record(node)
            .is_some_and(|r| r.state == NodeState::Pending && r.next_attempt_number() == attempt)
    }

    /// The termination predicate: nothing scheduled and every exit node
    /// settled (`Completed` or `Skipped`).
    #[must_use]
    pub fn termination_ready(&self) -> bool {
        self.state == ExecutionStatus::Running
            && self.scheduled.is_empty()
            && self.deferred.is_empty()
            && self.processed.exit_nodes().iter().all(|exit| {
                self.node_record(exit).is_some_and(|r| r.state.is_settled())
            })
    }

    /// Milliseconds since the run was created.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }

    /// A timestamp-free structural summary, used to compare replayed runs
    /// with originals.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        let mut nodes = serde_json::Map::new();
        let mut keys: Vec<&NodeKey> = self.node_records.keys().collect();
        keys.sort();
        for key in keys {
            let record = &self.node_records[key];
            nodes.insert(
                key.to_string(),
                serde_json::json!({
                    "state": record.state,
                    "output": record.output,
                    "error": record.error,
                    "retry_count": record.retry_count,
                    "attempts": record.attempts.len(),
                    "input": record.input,
                }),
            );
        }
        serde_json::json!({
            "state": self.state,
            "error": self.error,
            "variables": self.variables,
            "nodes": nodes,
        })
    }

    // ── Replay ──────────────────────────────────────────────────────────

    /// Rebuild a context by folding a persisted event stream (ascending
    /// order) into a fresh run. The result equals the original up to
    /// timestamps.
    pub fn replay(
        processed: Arc<ProcessedWorkflow>,
        config: RunConfig,
        events: &[DomainEvent],
    ) -> Result<Self, ExecutionError> {
        let first = events
            .first()
            .ok_or_else(|| ExecutionError::Replay("empty event stream".into()))?;
        if first.event_type != names::WORKFLOW_STARTED {
            return Err(ExecutionError::Replay(format!(
                "stream must begin with {}, got {}",
                names::WORKFLOW_STARTED,
                first.event_type
            )));
        }
        let execution_id = first
            .metadata
            .execution_id
            .ok_or_else(|| ExecutionError::Replay("started event lacks execution id".into()))?;
        let workflow_id = first
            .metadata
            .workflow_id
            .ok_or_else(|| ExecutionError::Replay("started event lacks workflow id".into()))?;
        let trigger_id = first
            .payload
            .get("trigger_id")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(TriggerId::nil);

        let mut ctx = Self::new(
            first.tenant_id,
            workflow_id,
            trigger_id,
            processed,
            serde_json::Map::new(),
            config,
        );
        ctx.execution_id = execution_id;

        for event in events {
            ctx.apply_replayed(event)?;
        }
        Ok(ctx)
    }

    fn apply_replayed(&mut self, event: &DomainEvent) -> Result<(), ExecutionError> {
        let node = event.metadata.node.clone();
        match event.event_type.as_str() {
            names::WORKFLOW_STARTED => {
                if let Some(Value::Object(vars)) = event.payload.get("variables") {
                    self.variables = vars.clone();
                }
                self.transition_run(ExecutionStatus::Running)
            }
            names::WORKFLOW_PAUSED => self.transition_run(ExecutionStatus::Paused),
            names::WORKFLOW_RESUMED => {
                self.state = ExecutionStatus::Running;
                Ok(())
            }
            names::WORKFLOW_COMPLETED => self.transition_run(ExecutionStatus::Completed),
            names::WORKFLOW_FAILED => {
                self.error = event
                    .payload
                    .get("error")
                    .and_then(Value::as_str)
                    .map(String::from);
                self.transition_run(ExecutionStatus::Failed)
            }
            names::WORKFLOW_CANCELLED => self.transition_run(ExecutionStatus::Cancelled),
            names::NODE_SCHEDULED => {
                let node = require_node(node)?;
                let attempt = payload_u64(event, "attempt").unwrap_or(1) as u32;
                let record = self.node_records.entry(node.clone()).or_default();
                if attempt > 1 {
                    record.state = NodeState::Pending;
                    record.retry_count = attempt - 1;
                }
                self.scheduled.insert(node);
                Ok(())
            }
            names::NODE_STARTED => {
                let node = require_node(node)?;
                let attempt = payload_u64(event, "attempt").unwrap_or(1) as u32;
                let record = self.node_records.entry(node).or_default();
                record.state = NodeState::Running;
                record.attempts.push(crate::attempt::NodeAttempt::new(attempt));
                record.input = event.payload.get("input").cloned();
                Ok(())
            }
            names::NODE_COMPLETED => {
                let node = require_node(node)?;
                let output = event.payload.get("output").cloned().unwrap_or(Value::Null);
                let record = self.node_records.entry(node.clone()).or_default();
                record.state = NodeState::Completed;
                record.output = Some(output.clone());
                record.error = None;
                if let Some(attempt) = record.latest_attempt_mut() {
                    attempt.complete_success(output);
                }
                self.scheduled.remove(&node);
                if let Some(Value::Object(writes)) = event.payload.get("variable_writes") {
                    for (key, value) in writes {
                        self.variables.insert(key.clone(), value.clone());
                    }
                }
                Ok(())
            }
            names::NODE_FAILED => {
                let node = require_node(node)?;
                let message = event
                    .payload
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                let record = self.node_records.entry(node.clone()).or_default();
                record.state = NodeState::Failed;
                record.error = Some(message.clone());
                if let Some(attempt) = record.latest_attempt_mut() {
                    attempt.complete_failure(message);
                }
                self.scheduled.remove(&node);
                Ok(())
            }
            names::NODE_SKIPPED => {
                let node = require_node(node)?;
                let record = self.node_records.entry(node.clone()).or_default();
                record.state = NodeState::Skipped;
                self.scheduled.remove(&node);
                Ok(())
            }
            names::NODE_CANCELLED => {
                let node = require_node(node)?;
                let record = self.node_records.entry(node.clone()).or_default();
                record.state = NodeState::Cancelled;
                self.scheduled.remove(&node);
                Ok(())
            }
            // Foreign event types (job mirrors, triggers) do not affect
            // run state.
            _ => Ok(()),
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn transition_run(&mut self, to: ExecutionStatus) -> Result<(), ExecutionError> {
        validate_execution_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }

    fn require_known(&self, node: &NodeKey) -> Result<(), ExecutionError> {
        if self.processed.node(node).is_some() {
            Ok(())
        } else {
            Err(ExecutionError::NodeNotFound(node.clone()))
        }
    }

    fn run_event(&self, event_type: &str, payload: Value) -> DomainEvent {
        DomainEvent::new(event_type, self.tenant_id, payload)
            .with_workflow(self.workflow_id)
            .with_execution(self.execution_id)
    }

    fn log(&mut self, kind: &str, action: &str, details: Option<Value>) {
        let entity = self.execution_id.to_string();
        self.history.push(HistoryEntry::now(kind, entity, action, details));
    }

    fn log_node(&mut self, node: &NodeKey, action: &str, details: Option<Value>) {
        self.history
            .push(HistoryEntry::now("node", node.as_str(), action, details));
    }
}

fn require_node(node: Option<NodeKey>) -> Result<NodeKey, ExecutionError> {
    node.ok_or_else(|| ExecutionError::Replay("node event lacks node metadata".into()))
}

fn payload_u64(event: &DomainEvent, field: &str) -> Option<u64> {
    event.payload.get(field).and_then(Value::as_u64)
}
