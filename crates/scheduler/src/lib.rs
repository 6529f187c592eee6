#![forbid(unsafe_code)]

//! # Gantry Scheduler
//!
//! Scheduled events: cron-driven (or one-shot) triggers that fire workflow
//! nodes through the engine. Cron expressions are evaluated in the
//! schedule's IANA timezone (UTC by default); `start_time` and `end_time`
//! clamp the firing window, and one-shot events complete after firing.

pub mod error;
pub mod event;
pub mod runner;

pub use error::SchedulerError;
pub use event::{Schedule, ScheduleStatus, ScheduledEvent};
pub use runner::{run_scheduler_loop, ScheduledEventStore, TriggerSink};
