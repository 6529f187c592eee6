//! The scheduler tick loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::event::ScheduledEvent;

/// Storage surface the tick loop needs; implemented by the repository
/// layer.
#[async_trait]
pub trait ScheduledEventStore: Send + Sync {
    /// Events due at `now` (active, `next_run <= now`).
    async fn due(&self, now: chrono::DateTime<Utc>) -> Vec<ScheduledEvent>;

    /// Persist an updated event.
    async fn save(&self, event: ScheduledEvent);
}

/// Where fired events go; implemented by the engine's trigger path.
#[async_trait]
pub trait TriggerSink: Send + Sync {
    /// Fire one scheduled event.
    async fn trigger(&self, event: &ScheduledEvent) -> Result<(), String>;
}

/// Run the scheduler loop until cancelled: every `interval`, fire the due
/// events and advance their schedules.
///
/// A failed trigger leaves `next_run` advanced anyway — the engine
/// persists the trigger as an event, so the occurrence is not lost, and a
/// broken sink must not make the scheduler re-fire the same occurrence
/// forever.
pub async fn run_scheduler_loop(
    store: Arc<dyn ScheduledEventStore>,
    sink: Arc<dyn TriggerSink>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = Utc::now();
        for mut event in store.due(now).await {
            if let Err(error) = sink.trigger(&event).await {
                tracing::warn!(
                    schedule_id = %event.id,
                    tenant_id = %event.tenant_id,
                    %error,
                    "scheduled trigger failed"
                );
            }
            match event.advance(now) {
                Ok(()) => store.save(event).await,
                Err(error) => {
                    tracing::error!(schedule_id = %event.id, %error, "schedule advance failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Schedule, ScheduleStatus};
    use gantry_core::{NodeKey, TenantId, WorkflowId};
    use parking_lot::Mutex;

    struct MemStore {
        events: Mutex<Vec<ScheduledEvent>>,
    }

    #[async_trait]
    impl ScheduledEventStore for MemStore {
        async fn due(&self, now: chrono::DateTime<Utc>) -> Vec<ScheduledEvent> {
            self.events
                .lock()
                .iter()
                .filter(|e| e.is_due(now))
                .cloned()
                .collect()
        }

        async fn save(&self, event: ScheduledEvent) {
            let mut events = self.events.lock();
            if let Some(slot) = events.iter_mut().find(|e| e.id == event.id) {
                *slot = event;
            }
        }
    }

    struct CountingSink {
        fired: Mutex<Vec<ScheduledEvent>>,
    }

    #[async_trait]
    impl TriggerSink for CountingSink {
        async fn trigger(&self, event: &ScheduledEvent) -> Result<(), String> {
            self.fired.lock().push(event.clone());
            Ok(())
        }
    }

    fn one_shot() -> ScheduledEvent {
        ScheduledEvent::new(
            TenantId::v4(),
            WorkflowId::v4(),
            NodeKey::new("n1").unwrap(),
            serde_json::json!({"from": "schedule"}),
            None,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn due_one_shot_fires_once_and_completes() {
        let store = Arc::new(MemStore { events: Mutex::new(vec![one_shot()]) });
        let sink = Arc::new(CountingSink { fired: Mutex::new(Vec::new()) });
        let cancel = CancellationToken::new();

        let loop_handle = tokio::spawn(run_scheduler_loop(
            store.clone(),
            sink.clone(),
            Duration::from_secs(1),
            cancel.clone(),
        ));

        // Let several ticks elapse; the one-shot must fire exactly once.
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
        loop_handle.await.unwrap();

        assert_eq!(sink.fired.lock().len(), 1);
        let stored = store.events.lock()[0].clone();
        assert_eq!(stored.status, ScheduleStatus::Completed);
        assert!(stored.last_run.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn paused_events_do_not_fire() {
        let mut event = one_shot();
        event.status = ScheduleStatus::Paused;
        let store = Arc::new(MemStore { events: Mutex::new(vec![event]) });
        let sink = Arc::new(CountingSink { fired: Mutex::new(Vec::new()) });
        let cancel = CancellationToken::new();

        let loop_handle = tokio::spawn(run_scheduler_loop(
            store.clone(),
            sink.clone(),
            Duration::from_secs(1),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();
        loop_handle.await.unwrap();

        assert!(sink.fired.lock().is_empty());
    }

    #[tokio::test]
    async fn recurring_event_advances_after_fire() {
        let schedule = Schedule {
            cron: "0 * * * *".to_string(),
            start_time: None,
            end_time: None,
            timezone: None,
        };
        let mut event = ScheduledEvent::new(
            TenantId::v4(),
            WorkflowId::v4(),
            NodeKey::new("n1").unwrap(),
            serde_json::Value::Null,
            Some(schedule),
        )
        .unwrap();
        // Force it due now.
        event.next_run = Some(Utc::now() - chrono::Duration::seconds(1));

        let store = Arc::new(MemStore { events: Mutex::new(vec![event]) });
        let sink = Arc::new(CountingSink { fired: Mutex::new(Vec::new()) });

        let now = Utc::now();
        for mut due in store.due(now).await {
            sink.trigger(&due).await.unwrap();
            due.advance(now).unwrap();
            store.save(due).await;
        }

        let stored = store.events.lock()[0].clone();
        assert_eq!(stored.status, ScheduleStatus::Active);
        assert!(stored.next_run.unwrap() > now);
        assert_eq!(sink.fired.lock().len(), 1);
    }
}
