//! Durable event store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gantry_core::{ExecutionId, TenantId, WorkflowId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::DomainEvent;

/// Errors produced by an event store backend.
#[derive(Debug, Clone, Error)]
pub enum EventStoreError {
    /// The backend rejected or lost the operation.
    #[error("event store backend: {0}")]
    Backend(String),
}

/// A persisted event with its per-tenant sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// The event.
    pub event: DomainEvent,
    /// Monotone per-tenant sequence, gap-free within one process.
    pub sequence: u64,
}

/// Append-only durable log keyed by `(tenant, sequence)`.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append an event; returns the assigned sequence number.
    async fn append(&self, event: DomainEvent) -> Result<StoredEvent, EventStoreError>;

    /// Events of one type for a tenant, newest first, up to `limit`.
    async fn by_type(
        &self,
        tenant_id: TenantId,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// All events for a tenant, in sequence order.
    async fn by_tenant(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// All events for a workflow, in sequence order.
    async fn by_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// All events for a single run, in sequence order.
    async fn by_execution(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Events in `[start, end]` for a tenant, ascending by timestamp.
    async fn by_time_range(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Stream events in `[start, end]` across tenants in ascending
    /// timestamp order, invoking `handler` once per event in batches of
    /// `batch_size`. Returns the number of events processed.
    ///
    /// Replay is restartable: re-issuing with the last-processed timestamp
    /// plus one millisecond yields exactly the remainder.
    async fn replay(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        batch_size: usize,
        handler: &mut (dyn for<'a> FnMut(&'a DomainEvent) + Send),
    ) -> Result<usize, EventStoreError>;
}

/// In-memory event store.
///
/// Timestamps are nudged forward so they stay strictly monotone per
/// tenant, which keeps `last + 1ms` replay restarts exact.
#[derive(Default)]
pub struct MemoryEventStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    events: Vec<StoredEvent>,
    sequences: HashMap<TenantId, u64>,
    last_timestamps: HashMap<TenantId, DateTime<Utc>>,
}

impl MemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events across tenants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    /// Returns `true` if the store holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().events.is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, mut event: DomainEvent) -> Result<StoredEvent, EventStoreError> {
        let mut inner = self.inner.write();

        let sequence = inner
            .sequences
            .entry(event.tenant_id)
            .and_modify(|s| *s += 1)
            .or_insert(1);
        let sequence = *sequence;

        if let Some(last) = inner.last_timestamps.get(&event.tenant_id) {
            if event.timestamp <= *last {
                event.timestamp = *last + Duration::milliseconds(1);
            }
        }
        inner.last_timestamps.insert(event.tenant_id, event.timestamp);

        let stored = StoredEvent { event, sequence };
        inner.events.push(stored.clone());
        Ok(stored)
    }

    async fn by_type(
        &self,
        tenant_id: TenantId,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read();
        let mut matched: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|s| s.event.tenant_id == tenant_id && s.event.event_type == event_type)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.event.timestamp.cmp(&a.event.timestamp));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn by_tenant(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read();
        Ok(inner
            .events
            .iter()
            .filter(|s| s.event.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn by_workflow(
        &self,
        tenant_id: TenantId,
        workflow_id: WorkflowId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read();
        Ok(inner
            .events
            .iter()
            .filter(|s| {
                s.event.tenant_id == tenant_id
                    && s.event.metadata.workflow_id == Some(workflow_id)
            })
            .cloned()
            .collect())
    }

    async fn by_execution(
        &self,
        tenant_id: TenantId,
        execution_id: ExecutionId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read();
        Ok(inner
            .events
            .iter()
            .filter(|s| {
                s.event.tenant_id == tenant_id
                    && s.event.metadata.execution_id == Some(execution_id)
            })
            .cloned()
            .collect())
    }

    async fn by_time_range(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read();
        let mut matched: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|s| {
                s.event.tenant_id == tenant_id
                    && s.event.timestamp >= start
                    && s.event.timestamp <= end
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.event.timestamp.cmp(&b.event.timestamp));
        Ok(matched)
    }

    async fn replay(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        batch_size: usize,
        handler: &mut (dyn for<'a> FnMut(&'a DomainEvent) + Send),
    ) -> Result<usize, EventStoreError> {
        let batch_size = batch_size.max(1);
        let mut matched: Vec<DomainEvent> = {
            let inner = self.inner.read();
            inner
                .events
                .iter()
                .filter(|s| s.event.timestamp >= start && s.event.timestamp <= end)
                .map(|s| s.event.clone())
                .collect()
        };
        matched.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let mut count = 0;
        for batch in matched.chunks(batch_size) {
            for event in batch {
                handler(event);
                count += 1;
            }
        }
        Ok(count)
    }
}
