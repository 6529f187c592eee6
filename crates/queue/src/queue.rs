//! The lane-partitioned job queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::select_all;
use gantry_core::JobId;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::job::{Job, JobStatus, JobStatusChange};
use crate::lane::LaneMap;

/// Broadcast capacity for job status mirror notifications.
const STATUS_CHANNEL_CAPACITY: usize = 4096;

/// Errors produced by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was closed while waiting for work.
    #[error("queue closed")]
    Closed,

    /// A job id was not known to the status tracker.
    #[error("unknown job: {0}")]
    UnknownJob(JobId),
}

struct Lane {
    sender: async_channel::Sender<Job>,
    receiver: async_channel::Receiver<Job>,
    in_flight: AtomicUsize,
}

/// In-process work queue with named lanes and at-least-once delivery.
///
/// Every node type routes to a lane via the static [`LaneMap`]; workers
/// consume from all lanes. Status changes are observable through
/// [`JobQueue::status_changes`] so the engine can mirror them into the
/// event store.
pub struct JobQueue {
    lanes: HashMap<String, Lane>,
    lane_map: LaneMap,
    statuses: DashMap<JobId, JobStatus>,
    status_tx: broadcast::Sender<JobStatusChange>,
}

impl JobQueue {
    /// Create a queue with one channel per lane in the map.
    #[must_use]
    pub fn new(lane_map: LaneMap) -> Arc<Self> {
        let mut lanes = HashMap::new();
        for name in lane_map.lane_names() {
            let (sender, receiver) = async_channel::unbounded();
            lanes.insert(name, Lane { sender, receiver, in_flight: AtomicUsize::new(0) });
        }
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Arc::new(Self { lanes, lane_map, statuses: DashMap::new(), status_tx })
    }

    /// The lane a node type routes to.
    #[must_use]
    pub fn lane_for(&self, node_type: &str) -> &str {
        self.lane_map.lane_for(node_type)
    }

    /// Observe job status changes.
    #[must_use]
    pub fn status_changes(&self) -> broadcast::Receiver<JobStatusChange> {
        self.status_tx.subscribe()
    }

    /// Enqueue a job immediately.
    pub fn enqueue(&self, job: Job) {
        self.set_status(&job, JobStatus::Queued);
        let lane = self.lane(&job.lane);
        // Unbounded channel: send only fails when every receiver is gone,
        // which means the process is shutting down.
        let _ = lane.sender.try_send(job);
    }

    /// Enqueue a job after a delay (retry backoff).
    pub fn enqueue_after(self: &Arc<Self>, job: Job, delay: Duration) {
        self.set_status(&job, JobStatus::Delayed);
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.enqueue(job);
        });
    }

    /// Wait for the next job from any lane and mark it in flight.
    pub async fn recv(&self) -> Result<Job, QueueError> {
        let futures: Vec<_> = self
            .lanes
            .values()
            .map(|lane| Box::pin(lane.receiver.recv()))
            .collect();
        let (result, _, _) = select_all(futures).await;
        let job = result.map_err(|_| QueueError::Closed)?;
        self.lane(&job.lane).in_flight.fetch_add(1, Ordering::SeqCst);
        self.set_status(&job, JobStatus::InFlight);
        Ok(job)
    }

    /// Mark a delivered job finished.
    pub fn complete(&self, job: &Job) {
        self.release(job, JobStatus::Completed);
    }

    /// Mark a delivered job failed (the engine decides about retries).
    pub fn fail(&self, job: &Job) {
        self.release(job, JobStatus::Failed);
    }

    /// Mark a delivered job dead (duplicate delivery or stale run).
    pub fn discard(&self, job: &Job) {
        self.release(job, JobStatus::Dead);
    }

    /// Current status of a job, if known.
    #[must_use]
    pub fn status(&self, job_id: JobId) -> Option<JobStatus> {
        self.statuses.get(&job_id).map(|s| *s)
    }

    /// Number of in-flight jobs on a lane.
    #[must_use]
    pub fn in_flight(&self, lane: &str) -> usize {
        self.lanes
            .get(lane)
            .map_or(0, |l| l.in_flight.load(Ordering::SeqCst))
    }

    /// Number of queued (not yet delivered) jobs on a lane.
    #[must_use]
    pub fn queued(&self, lane: &str) -> usize {
        self.lanes.get(lane).map_or(0, |l| l.receiver.len())
    }

    /// Returns `true` if any lane's pending work exceeds the watermark.
    #[must_use]
    pub fn is_saturated(&self, watermark: usize) -> bool {
        self.lanes
            .values()
            .any(|l| l.in_flight.load(Ordering::SeqCst) + l.receiver.len() > watermark)
    }

    fn release(&self, job: &Job, status: JobStatus) {
        self.lane(&job.lane).in_flight.fetch_sub(1, Ordering::SeqCst);
        self.set_status(job, status);
    }

    fn lane(&self, name: &str) -> &Lane {
        // Jobs are only constructed with lanes from this queue's map.
        self.lanes.get(name).unwrap_or_else(|| &self.lanes[crate::lane::DEFAULT_LANE])
    }

    fn set_status(&self, job: &Job, status: JobStatus) {
        self.statuses.insert(job.id, status);
        let _ = self.status_tx.send(JobStatusChange {
            job_id: job.id,
            tenant_id: job.tenant_id,
            execution_id: job.execution_id,
            node: job.node.clone(),
            attempt: job.attempt,
            lane: job.lane.clone(),
            status,
        });
    }
}
