//! Worker loop: job consumption, strategy execution, and completion
//! routing.

use std::sync::Arc;
use std::time::Duration;

use gantry_execution::{ExecutionStatus, NodeError};
use gantry_queue::{Job, QueueError};
use gantry_strategy::{RunView, Strategy, StrategyError};
use gantry_workflow::{EdgeKind, NodeDefinition};
use rand::Rng;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::selection;

/// What a bounded strategy execution produced.
enum ExecOutcome {
    Success(serde_json::Value),
    Failure(StrategyError),
    TimedOut,
}

impl Engine {
    /// Consume jobs until shutdown.
    pub(crate) async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        tracing::debug!(worker_id, "worker started");
        loop {
            let job = tokio::select! {
                () = self.shutdown_token().cancelled() => break,
                job = self.queue.recv() => match job {
                    Ok(job) => job,
                    Err(QueueError::Closed) => break,
                    Err(error) => {
                        tracing::error!(worker_id, %error, "queue receive failed");
                        continue;
                    }
                },
            };
            if let Err(error) = self.process_job(&job).await {
                tracing::error!(
                    worker_id,
                    execution_id = %job.execution_id,
                    node = %job.node,
                    %error,
                    "job processing failed"
                );
            }
        }
        tracing::debug!(worker_id, "worker stopped");
    }

    /// Process one delivery. At-least-once queues re-deliver; the
    /// in-flight marker and the pending-attempt check make execution
    /// at-most-once per `(run, node, attempt)`.
    async fn process_job(&self, job: &Job) -> Result<(), EngineError> {
        let Ok(handle) = self.run(job.execution_id) else {
            // Stale delivery for a run this engine no longer owns.
            self.queue.discard(job);
            return Ok(());
        };

        let marker = (job.execution_id, job.node.clone(), job.attempt);
        if self.in_flight.insert(marker.clone(), ()).is_some() {
            self.queue.discard(job);
            return Ok(());
        }

        // Phase 1: under the run lock, re-read live state and open the
        // attempt.
        let started = {
            let mut ctx = handle.ctx.lock().await;
            if !ctx.state.is_active() || !ctx.is_pending_attempt(&job.node, job.attempt) {
                None
            } else {
                let input = selection::resolve_input(&ctx, &job.node);
                let events = ctx.start_node(&job.node, input.clone())?;
                self.bus.publish_all(events).await?;

                let node_def = ctx
                    .processed()
                    .node(&job.node)
                    .cloned()
                    .ok_or_else(|| EngineError::NoWorkflowForNode(job.node.clone()))?;
                let view = RunView {
                    tenant_id: ctx.tenant_id,
                    workflow_id: ctx.workflow_id,
                    execution_id: ctx.execution_id,
                    node: job.node.clone(),
                    attempt: job.attempt,
                    input,
                    variables: ctx.variables.clone(),
                    cancellation: handle.cancel.child_token(),
                };
                let timeout = ctx.node_timeout(&job.node);
                let grace = ctx.config.cancel_grace;
                Some((node_def, view, timeout, grace))
            }
        };

        let Some((node_def, view, timeout, grace)) = started else {
            self.in_flight.remove(&marker);
            self.queue.discard(job);
            return Ok(());
        };

        let strategy = self
            .strategies
            .get(&node_def.node_type)
            .cloned()
            .ok_or_else(|| EngineError::UnknownNodeType(node_def.node_type.clone()))?;

        // Phase 2: execute outside the lock; this is the only unbounded
        // suspension point.
        let outcome = execute_bounded(strategy.as_ref(), &view, &node_def, timeout, grace).await;

        // Cleanup runs on every exit path and never propagates.
        strategy.cleanup(&view, &node_def).await;
        self.in_flight.remove(&marker);

        // Phase 3: route the result under the run lock.
        let mut ctx = handle.ctx.lock().await;
        if !ctx.state.is_active() {
            // The run settled (cancelled) while we executed; its nodes are
            // already recorded.
            self.queue.discard(job);
            return Ok(());
        }

        match outcome {
            ExecOutcome::Success(output) => {
                self.queue.complete(job);
                let writes = selection::output_mapping_writes(&ctx, &job.node, &output);
                let events = ctx.complete_node(&job.node, output.clone(), writes)?;
                self.bus.publish_all(events).await?;
                self.persist(&ctx).await;

                if ctx.state == ExecutionStatus::Paused {
                    ctx.defer_completion(job.node.clone(), output);
                    return Ok(());
                }

                let plan = selection::plan_successors(&mut ctx, &job.node, &output, false)?;
                self.apply_plan(&mut ctx, plan).await?;
                self.check_termination(&mut ctx).await?;
            }
            ExecOutcome::Failure(error) => {
                self.queue.fail(job);
                let node_error =
                    NodeError { message: error.message, retryable: error.retryable };
                self.route_failure(&mut ctx, job, node_error).await?;
            }
            ExecOutcome::TimedOut => {
                self.queue.fail(job);
                let node_error = NodeError { message: "timeout".to_string(), retryable: false };
                self.route_failure(&mut ctx, job, node_error).await?;
            }
        }
        Ok(())
    }

    /// Record a failed attempt, then retry, route along a failure edge,
    /// or fail the run.
    async fn route_failure(
        &self,
        ctx: &mut gantry_execution::Context,
        job: &Job,
        error: NodeError,
    ) -> Result<(), EngineError> {
        let events = ctx.fail_node(&job.node, &error)?;
        self.bus.publish_all(events).await?;
        self.persist(ctx).await;

        if ctx.can_retry(&job.node, error.retryable) {
            let events = ctx.retry_node(&job.node)?;
            self.bus.publish_all(events).await?;

            let retry_count = ctx.node_record(&job.node).map_or(1, |r| r.retry_count);
            let delay = backoff_delay(ctx.config.retry_delay, retry_count, self.config.max_backoff);
            let next = Job::new(
                job.tenant_id,
                job.execution_id,
                job.node.clone(),
                retry_count + 1,
                job.lane.clone(),
            );
            tracing::info!(
                execution_id = %job.execution_id,
                node = %job.node,
                attempt = retry_count + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying node"
            );
            self.queue.enqueue_after(next, delay);
            self.persist(ctx).await;
            return Ok(());
        }

        let has_failure_edge = ctx
            .processed()
            .outgoing_edges(&job.node)
            .any(|e| e.kind == EdgeKind::Failure);
        if has_failure_edge {
            let error_output = serde_json::json!({
                "error": error.message,
                "node": job.node,
            });
            let plan = selection::plan_successors(ctx, &job.node, &error_output, true)?;
            self.apply_plan(ctx, plan).await?;
            self.check_termination(ctx).await?;
            return Ok(());
        }

        let events = ctx.fail(error.message)?;
        self.bus.publish_all(events).await?;
        self.persist(ctx).await;
        tracing::warn!(execution_id = %ctx.execution_id, node = %job.node, "run failed");
        Ok(())
    }
}

/// Run a strategy bounded by the node timeout: on expiry, fire the
/// cooperative cancel and accept a result arriving within the grace
/// window; past that, the attempt is a timeout.
async fn execute_bounded(
    strategy: &dyn Strategy,
    view: &RunView,
    node_def: &NodeDefinition,
    timeout: Duration,
    grace: Duration,
) -> ExecOutcome {
    let fut = strategy.execute(view, node_def);
    tokio::pin!(fut);

    let result = tokio::select! {
        result = &mut fut => Some(result),
        () = tokio::time::sleep(timeout) => None,
    };
    match result {
        Some(Ok(output)) => ExecOutcome::Success(output),
        Some(Err(error)) => ExecOutcome::Failure(error),
        None => {
            view.cancellation.cancel();
            tokio::select! {
                result = &mut fut => match result {
                    // A result landing inside the grace window is accepted;
                    // an error here was induced by our cancel and records
                    // as a timeout.
                    Ok(output) => ExecOutcome::Success(output),
                    Err(_) => ExecOutcome::TimedOut,
                },
                () = tokio::time::sleep(grace) => ExecOutcome::TimedOut,
            }
        }
    }
}

/// Exponential backoff seeded by the run's retry delay, jittered by up to
/// 25% and capped.
fn backoff_delay(base: Duration, retry_count: u32, cap: Duration) -> Duration {
    let exponent = retry_count.saturating_sub(1).min(16);
    let raw = base.saturating_mul(2u32.saturating_pow(exponent));
    let capped = raw.min(cap);
    let jitter = rand::rng().random_range(0.0..=0.25);
    capped.mul_f64(1.0 + jitter).min(cap.saturating_mul(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_with_jitter() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_secs(60);

        let first = backoff_delay(base, 1, cap);
        assert!(first >= Duration::from_millis(100));
        assert!(first <= Duration::from_millis(125));

        let second = backoff_delay(base, 2, cap);
        assert!(second >= Duration::from_millis(200));
        assert!(second <= Duration::from_millis(250));

        let third = backoff_delay(base, 3, cap);
        assert!(third >= Duration::from_millis(400));
        assert!(third <= Duration::from_millis(500));
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_secs(10);
        let cap = Duration::from_secs(30);
        let delay = backoff_delay(base, 10, cap);
        assert!(delay <= Duration::from_secs(60), "cap plus jitter bound");
        assert!(delay >= Duration::from_secs(30));
    }
}
