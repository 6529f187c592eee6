//! Event bus: append-first publishing with in-process subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::event::DomainEvent;
use crate::store::{EventStore, EventStoreError, StoredEvent};

/// Broadcast channel capacity for passive observers.
const BROADCAST_CAPACITY: usize = 1024;

/// An in-process consumer of domain events.
///
/// Delivery is at-least-once; implementations must be idempotent keyed on
/// the event id. Errors are logged and never unpublish the event.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscriber name, used in log lines.
    fn name(&self) -> &str;

    /// Handle one event.
    async fn handle(&self, event: &DomainEvent) -> Result<(), String>;
}

/// Publishes domain events: persists through the event store, then routes
/// to subscribers.
///
/// The publisher considers an event published only once the store
/// acknowledges the append; subscriber failures do not unpublish.
pub struct EventBus {
    store: Arc<dyn EventStore>,
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
    broadcast: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus backed by the given store.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            store,
            subscribers: RwLock::new(Vec::new()),
            broadcast,
        }
    }

    /// Register a subscriber. Subscribers added after a publish do not see
    /// earlier events; use the store for catch-up.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// A broadcast receiver for passive observation. Lagging observers
    /// lose events (at-least-once applies to subscribers, not observers).
    #[must_use]
    pub fn observe(&self) -> broadcast::Receiver<DomainEvent> {
        self.broadcast.subscribe()
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Publish an event: append to the store, then notify subscribers.
    pub async fn publish(&self, event: DomainEvent) -> Result<StoredEvent, EventStoreError> {
        let stored = self.store.append(event).await?;

        let subscribers: Vec<Arc<dyn EventSubscriber>> =
            self.subscribers.read().iter().cloned().collect();
        for subscriber in subscribers {
            if let Err(error) = subscriber.handle(&stored.event).await {
                tracing::warn!(
                    subscriber = subscriber.name(),
                    event_type = %stored.event.event_type,
                    event_id = %stored.event.id,
                    %error,
                    "event subscriber failed; event remains published"
                );
            }
        }

        let _ = self.broadcast.send(stored.event.clone());
        Ok(stored)
    }

    /// Publish a batch in order, stopping at the first store failure.
    pub async fn publish_all(
        &self,
        events: Vec<DomainEvent>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut stored = Vec::with_capacity(events.len());
        for event in events {
            stored.push(self.publish(event).await?);
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryEventStore;
    use gantry_core::TenantId;
    use parking_lot::Mutex;

    struct Recorder {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl EventSubscriber for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn handle(&self, event: &DomainEvent) -> Result<(), String> {
            self.seen.lock().push(event.event_type.clone());
            if self.fail {
                Err("boom".into())
            } else {
                Ok(())
            }
        }
    }

    fn bus() -> (Arc<MemoryEventStore>, EventBus) {
        let store = Arc::new(MemoryEventStore::new());
        let bus = EventBus::new(store.clone());
        (store, bus)
    }

    #[tokio::test]
    async fn publish_appends_then_notifies() {
        let (store, bus) = bus();
        let recorder = Arc::new(Recorder { seen: Mutex::new(Vec::new()), fail: false });
        bus.subscribe(recorder.clone());

        let stored = bus
            .publish(DomainEvent::new("a", TenantId::v4(), serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(stored.sequence, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(recorder.seen.lock().as_slice(), ["a"]);
    }

    #[tokio::test]
    async fn subscriber_failure_does_not_unpublish() {
        let (store, bus) = bus();
        let failing = Arc::new(Recorder { seen: Mutex::new(Vec::new()), fail: true });
        bus.subscribe(failing.clone());

        let result = bus
            .publish(DomainEvent::new("a", TenantId::v4(), serde_json::json!({})))
            .await;

        assert!(result.is_ok());
        assert_eq!(store.len(), 1);
        assert_eq!(failing.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn observers_receive_published_events() {
        let (_store, bus) = bus();
        let mut rx = bus.observe();

        bus.publish(DomainEvent::new("tick", TenantId::v4(), serde_json::json!({})))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "tick");
    }

    #[tokio::test]
    async fn publish_all_preserves_order() {
        let (store, bus) = bus();
        let tenant = TenantId::v4();
        let events = vec![
            DomainEvent::new("first", tenant, serde_json::json!({})),
            DomainEvent::new("second", tenant, serde_json::json!({})),
            DomainEvent::new("third", tenant, serde_json::json!({})),
        ];
        let stored = bus.publish_all(events).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(store.len(), 3);
        assert!(stored.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }
}
