//! The engine: run ownership, trigger admission, and lifecycle control.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use gantry_core::{ExecutionId, NodeKey, TenantId, TriggerId};
use gantry_events::{names, DomainEvent, EventBus};
use gantry_execution::Context;
use gantry_queue::{Job, JobQueue, JobStatus, JobStatusChange};
use gantry_scheduler::{ScheduledEvent, TriggerSink};
use gantry_storage::{ExecutionRecordRow, ExecutionRepository, NodeExecutionRow, WorkflowRepository};
use gantry_strategy::StrategyRegistry;
use gantry_workflow::{ProcessedWorkflow, WorkflowDefinition};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::selection::{self, SuccessorPlan};

/// How often the backpressure pump re-checks deferred triggers.
const DEFERRED_PUMP_INTERVAL: Duration = Duration::from_millis(500);

/// One live run: the context behind its critical-section mutex plus the
/// run's cancellation root.
pub(crate) struct RunHandle {
    pub(crate) ctx: Mutex<Context>,
    pub(crate) cancel: CancellationToken,
}

/// A trigger admitted later, once queue capacity frees up.
struct PendingTrigger {
    tenant_id: TenantId,
    node: NodeKey,
    input: serde_json::Value,
    trigger_id: TriggerId,
}

/// The result of submitting a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    /// The trigger id (provided or generated).
    pub trigger_id: TriggerId,
    /// The run the trigger produced, once admitted.
    pub execution_id: Option<ExecutionId>,
    /// `true` if this trigger id had already produced a run.
    pub deduplicated: bool,
    /// `true` if admission was deferred by backpressure.
    pub deferred: bool,
}

/// The workflow execution engine.
pub struct Engine {
    pub(crate) queue: Arc<JobQueue>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) strategies: Arc<StrategyRegistry>,
    pub(crate) workflows: Arc<dyn WorkflowRepository>,
    pub(crate) executions: Arc<dyn ExecutionRepository>,
    pub(crate) config: EngineConfig,
    pub(crate) runs: DashMap<ExecutionId, Arc<RunHandle>>,
    /// Trigger dedup: the same trigger id produces at most one run.
    triggers: DashMap<TriggerId, ExecutionId>,
    /// Duplicate-delivery markers keyed on `(run, node, attempt)`.
    pub(crate) in_flight: DashMap<(ExecutionId, NodeKey, u32), ()>,
    deferred_triggers: SyncMutex<VecDeque<PendingTrigger>>,
    shutdown: CancellationToken,
}

impl Engine {
    /// Assemble an engine over its collaborators.
    #[must_use]
    pub fn new(
        queue: Arc<JobQueue>,
        bus: Arc<EventBus>,
        strategies: Arc<StrategyRegistry>,
        workflows: Arc<dyn WorkflowRepository>,
        executions: Arc<dyn ExecutionRepository>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            bus,
            strategies,
            workflows,
            executions,
            config,
            runs: DashMap::new(),
            triggers: DashMap::new(),
            in_flight: DashMap::new(),
            deferred_triggers: SyncMutex::new(VecDeque::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Spawn the worker pool, the job-status mirror, and the deferred
    /// trigger pump.
    pub fn start(self: &Arc<Self>) {
        for worker_id in 0..self.config.workers.max(1) {
            let engine = Arc::clone(self);
            tokio::spawn(async move { engine.worker_loop(worker_id).await });
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.mirror_job_statuses().await });

        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.pump_deferred_triggers().await });
    }

    /// Signal every loop to stop and cancel live runs' tokens.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Submit an external trigger for a node.
    ///
    /// The trigger is persisted as an event before admission; duplicate
    /// trigger ids return the existing run; saturation defers admission
    /// until capacity frees up.
    pub async fn trigger_node(
        &self,
        tenant_id: TenantId,
        node: NodeKey,
        input: serde_json::Value,
        metadata: serde_json::Value,
        trigger_id: Option<TriggerId>,
    ) -> Result<TriggerOutcome, EngineError> {
        let trigger_id = trigger_id.unwrap_or_else(TriggerId::v4);
        if let Some(existing) = self.triggers.get(&trigger_id) {
            let execution_id = (!existing.is_nil()).then_some(*existing);
            return Ok(TriggerOutcome {
                trigger_id,
                execution_id,
                deduplicated: true,
                deferred: false,
            });
        }
        // Claim the trigger id before any await so a concurrent duplicate
        // (or a deferral) can never produce a second run.
        self.triggers.insert(trigger_id, ExecutionId::nil());

        let outcome = self
            .admit_trigger(tenant_id, node, input, metadata, trigger_id)
            .await;
        if outcome.is_err() {
            // Release the claim so a corrected retry can go through.
            self.triggers.remove(&trigger_id);
        }
        outcome
    }

    async fn admit_trigger(
        &self,
        tenant_id: TenantId,
        node: NodeKey,
        input: serde_json::Value,
        metadata: serde_json::Value,
        trigger_id: TriggerId,
    ) -> Result<TriggerOutcome, EngineError> {
        let workflow = self
            .workflows
            .find_by_node(tenant_id, &node)
            .await?
            .ok_or_else(|| EngineError::NoWorkflowForNode(node.clone()))?;

        self.bus
            .publish(
                DomainEvent::new(
                    names::TRIGGER_RECEIVED,
                    tenant_id,
                    serde_json::json!({
                        "trigger_id": trigger_id,
                        "node": node,
                        "input": input,
                        "metadata": metadata,
                    }),
                )
                .with_workflow(workflow.id),
            )
            .await?;

        if self.queue.is_saturated(self.config.lane_watermark) {
            self.deferred_triggers.lock().push_back(PendingTrigger {
                tenant_id,
                node,
                input,
                trigger_id,
            });
            return Ok(TriggerOutcome {
                trigger_id,
                execution_id: None,
                deduplicated: false,
                deferred: true,
            });
        }

        let execution_id = self.admit(tenant_id, &workflow, node, input, trigger_id).await?;
        Ok(TriggerOutcome {
            trigger_id,
            execution_id: Some(execution_id),
            deduplicated: false,
            deferred: false,
        })
    }

    /// Create and start a run rooted at `node`.
    async fn admit(
        &self,
        tenant_id: TenantId,
        workflow: &WorkflowDefinition,
        node: NodeKey,
        input: serde_json::Value,
        trigger_id: TriggerId,
    ) -> Result<ExecutionId, EngineError> {
        let processed = Arc::new(ProcessedWorkflow::process(
            workflow.nodes.clone(),
            workflow.edges.clone(),
        )?);
        for def in processed.nodes().values() {
            if !self.strategies.contains(&def.node_type) {
                return Err(EngineError::UnknownNodeType(def.node_type.clone()));
            }
        }
        let root = processed
            .node(&node)
            .ok_or_else(|| EngineError::NoWorkflowForNode(node.clone()))?
            .clone();

        // Trigger input seeds the run variables.
        let variables = match input {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };

        let mut ctx = Context::new(
            tenant_id,
            workflow.id,
            trigger_id,
            Arc::clone(&processed),
            variables,
            self.config.run.clone(),
        );
        let execution_id = ctx.execution_id;

        let mut events = ctx.start()?;
        events.extend(ctx.schedule_node(&node)?);

        // Nodes outside the triggered subgraph can never fire; settle them
        // as skipped so convergence and termination stay well-defined.
        let reachable = processed.reachable_from(&node);
        let mut outside: Vec<NodeKey> = processed
            .nodes()
            .keys()
            .filter(|k| !reachable.contains(*k))
            .cloned()
            .collect();
        outside.sort();
        let mut plan = SuccessorPlan::default();
        for k in &outside {
            if ctx.node_record(k).is_none() {
                events.extend(ctx.skip_node(k, "outside the triggered subgraph")?);
            }
        }
        for k in &outside {
            let successors: Vec<NodeKey> = processed.successors(k).to_vec();
            for target in successors {
                if reachable.contains(&target) {
                    selection::resolve_suppression(&mut ctx, &target, k, &mut plan)?;
                }
            }
        }
        events.extend(std::mem::take(&mut plan.events));
        self.bus.publish_all(events).await?;
        debug_assert!(plan.schedule.is_empty(), "nothing has fired at admission");

        self.persist(&ctx).await;

        let job = Job::new(
            tenant_id,
            execution_id,
            node,
            1,
            self.queue.lane_for(&root.node_type),
        );
        self.runs.insert(
            execution_id,
            Arc::new(RunHandle { ctx: Mutex::new(ctx), cancel: CancellationToken::new() }),
        );
        self.triggers.insert(trigger_id, execution_id);
        self.queue.enqueue(job);

        tracing::info!(%execution_id, workflow_id = %workflow.id, %tenant_id, "run admitted");
        Ok(execution_id)
    }

    /// Pause a run: in-flight nodes finish, successors defer.
    pub async fn pause(&self, execution_id: ExecutionId) -> Result<(), EngineError> {
        let handle = self.run(execution_id)?;
        let mut ctx = handle.ctx.lock().await;
        let events = ctx.pause()?;
        self.bus.publish_all(events).await?;
        self.persist(&ctx).await;
        Ok(())
    }

    /// Resume a paused run and re-evaluate deferred completions.
    pub async fn resume(&self, execution_id: ExecutionId) -> Result<(), EngineError> {
        let handle = self.run(execution_id)?;
        let mut ctx = handle.ctx.lock().await;
        let events = ctx.resume()?;
        self.bus.publish_all(events).await?;

        for completion in ctx.take_deferred() {
            let plan =
                selection::plan_successors(&mut ctx, &completion.node, &completion.output, false)?;
            self.apply_plan(&mut ctx, plan).await?;
        }
        self.check_termination(&mut ctx).await?;
        self.persist(&ctx).await;
        Ok(())
    }

    /// Cancel a run: broadcast the cooperative signal and settle every
    /// pending or running node as cancelled.
    pub async fn cancel(&self, execution_id: ExecutionId) -> Result<(), EngineError> {
        let handle = self.run(execution_id)?;
        let mut ctx = handle.ctx.lock().await;
        let (events, was_running) = ctx.cancel()?;
        handle.cancel.cancel();
        self.bus.publish_all(events).await?;
        self.persist(&ctx).await;
        tracing::info!(%execution_id, running = was_running.len(), "run cancelled");
        Ok(())
    }

    /// A read-only snapshot of a live run's structural state.
    pub async fn run_snapshot(
        &self,
        execution_id: ExecutionId,
    ) -> Result<serde_json::Value, EngineError> {
        let handle = self.run(execution_id)?;
        let ctx = handle.ctx.lock().await;
        Ok(ctx.snapshot())
    }

    pub(crate) fn run(&self, execution_id: ExecutionId) -> Result<Arc<RunHandle>, EngineError> {
        self.runs
            .get(&execution_id)
            .map(|h| Arc::clone(&h))
            .ok_or(EngineError::RunNotFound(execution_id))
    }

    /// Publish skip events, then schedule every planned node: the
    /// schedule event is persisted before the job is enqueued.
    pub(crate) async fn apply_plan(
        &self,
        ctx: &mut Context,
        plan: SuccessorPlan,
    ) -> Result<(), EngineError> {
        self.bus.publish_all(plan.events).await?;
        for target in plan.schedule {
            let events = ctx.schedule_node(&target)?;
            self.bus.publish_all(events).await?;

            let node_type = ctx
                .processed()
                .node(&target)
                .map(|n| n.node_type.clone())
                .unwrap_or_default();
            let attempt = ctx.node_record(&target).map_or(1, |r| r.next_attempt_number());
            let job = Job::new(
                ctx.tenant_id,
                ctx.execution_id,
                target,
                attempt,
                self.queue.lane_for(&node_type),
            );
            self.queue.enqueue(job);
        }
        Ok(())
    }

    /// Complete the run once nothing is scheduled and every exit settled.
    pub(crate) async fn check_termination(&self, ctx: &mut Context) -> Result<(), EngineError> {
        if ctx.termination_ready() {
            let events = ctx.complete()?;
            self.bus.publish_all(events).await?;
            self.persist(ctx).await;
            tracing::info!(execution_id = %ctx.execution_id, "run completed");
        }
        Ok(())
    }

    /// Snapshot the run into the execution repository. Persistence
    /// failures are logged, not fatal: the event stream remains the
    /// durable record.
    pub(crate) async fn persist(&self, ctx: &Context) {
        let row = ExecutionRecordRow::from_context(ctx);
        let nodes = NodeExecutionRow::from_context(ctx);
        if let Err(error) = self.executions.upsert(row, nodes).await {
            tracing::warn!(execution_id = %ctx.execution_id, %error, "run snapshot persist failed");
        }
    }

    /// Mirror queue job status changes into the event store.
    async fn mirror_job_statuses(&self) {
        let mut rx = self.queue.status_changes();
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                change = rx.recv() => match change {
                    Ok(change) => self.publish_job_status(change).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "job status mirror lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    async fn publish_job_status(&self, change: JobStatusChange) {
        let event_type = match change.status {
            JobStatus::Queued | JobStatus::Delayed => names::JOB_QUEUED,
            JobStatus::InFlight => names::JOB_IN_FLIGHT,
            JobStatus::Completed => names::JOB_COMPLETED,
            JobStatus::Failed | JobStatus::Dead => names::JOB_FAILED,
        };
        let event = DomainEvent::new(
            event_type,
            change.tenant_id,
            serde_json::json!({
                "lane": change.lane,
                "node": change.node,
                "attempt": change.attempt,
                "status": change.status,
            }),
        )
        .with_execution(change.execution_id)
        .with_node(change.node.clone())
        .with_job(change.job_id);
        if let Err(error) = self.bus.publish(event).await {
            tracing::warn!(%error, "job status mirror publish failed");
        }
    }

    /// Admit deferred triggers as capacity frees up.
    async fn pump_deferred_triggers(&self) {
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(DEFERRED_PUMP_INTERVAL) => {}
            }

            while !self.queue.is_saturated(self.config.lane_watermark) {
                let Some(pending) = self.deferred_triggers.lock().pop_front() else {
                    break;
                };
                let workflow = match self.workflows.find_by_node(pending.tenant_id, &pending.node).await {
                    Ok(Some(workflow)) => workflow,
                    Ok(None) => {
                        tracing::warn!(node = %pending.node, "deferred trigger's workflow vanished");
                        continue;
                    }
                    Err(error) => {
                        tracing::warn!(%error, "deferred trigger lookup failed");
                        continue;
                    }
                };
                if let Err(error) = self
                    .admit(
                        pending.tenant_id,
                        &workflow,
                        pending.node.clone(),
                        pending.input.clone(),
                        pending.trigger_id,
                    )
                    .await
                {
                    tracing::error!(%error, node = %pending.node, "deferred trigger admission failed");
                }
            }
        }
    }
}

#[async_trait]
impl TriggerSink for Engine {
    async fn trigger(&self, event: &ScheduledEvent) -> Result<(), String> {
        self.trigger_node(
            event.tenant_id,
            event.node.clone(),
            event.data.clone(),
            serde_json::json!({"schedule_id": event.id}),
            None,
        )
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
    }
}
