//! Scheduled event model and cron evaluation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use gantry_core::{NodeKey, ScheduleId, TenantId, WorkflowId};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Recurrence description for a scheduled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Cron expression (standard five-field; a seconds field is accepted).
    pub cron: String,
    /// Do not fire before this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Do not fire after this instant; the event completes once passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// IANA timezone the cron expression is evaluated in; UTC by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Schedule {
    /// The timezone to evaluate the cron in.
    pub fn tz(&self) -> Result<Tz, SchedulerError> {
        match &self.timezone {
            None => Ok(Tz::UTC),
            Some(name) => name
                .parse()
                .map_err(|_| SchedulerError::InvalidTimezone(name.clone())),
        }
    }

    /// The next fire time strictly after `after`, respecting the window.
    /// `None` means the schedule will never fire again.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        let tz = self.tz()?;
        let schedule = parse_cron(&self.cron)?;

        // Clamp the search start to the window's opening.
        let from = match self.start_time {
            Some(start) if start > after => start,
            _ => after,
        };

        let next = schedule
            .after(&from.with_timezone(&tz))
            .next()
            .map(|dt| dt.with_timezone(&Utc));

        Ok(match (next, self.end_time) {
            (Some(n), Some(end)) if n > end => None,
            (next, _) => next,
        })
    }

    /// Validate the expression and timezone without computing anything.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        self.tz()?;
        parse_cron(&self.cron)?;
        Ok(())
    }
}

/// Parse a cron expression, accepting the standard five-field form by
/// prepending a zero seconds field.
fn parse_cron(expression: &str) -> Result<cron::Schedule, SchedulerError> {
    let normalized = if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    cron::Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// Lifecycle status of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Eligible to fire.
    #[default]
    Active,
    /// Suspended; keeps its definition but never fires.
    Paused,
    /// Exhausted (one-shot fired, or window closed).
    Completed,
}

/// A stored scheduled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Unique id.
    pub id: ScheduleId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// The workflow to trigger.
    pub workflow_id: WorkflowId,
    /// The node to fire.
    pub node: NodeKey,
    /// Trigger input payload.
    pub data: serde_json::Value,
    /// Recurrence; `None` makes this a one-shot event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ScheduleStatus,
    /// When the event last fired.
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    /// When the event will next fire.
    #[serde(default)]
    pub next_run: Option<DateTime<Utc>>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ScheduledEvent {
    /// Create an active scheduled event, computing its first `next_run`.
    pub fn new(
        tenant_id: TenantId,
        workflow_id: WorkflowId,
        node: NodeKey,
        data: serde_json::Value,
        schedule: Option<Schedule>,
    ) -> Result<Self, SchedulerError> {
        let now = Utc::now();
        let next_run = match &schedule {
            Some(s) => {
                s.validate()?;
                s.next_after(now)?
            }
            // One-shot events fire on the next tick.
            None => Some(now),
        };
        Ok(Self {
            id: ScheduleId::v4(),
            tenant_id,
            workflow_id,
            node,
            data,
            schedule,
            status: ScheduleStatus::Active,
            last_run: None,
            next_run,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the event is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Active
            && self.next_run.is_some_and(|next| next <= now)
    }

    /// Advance the event after firing at `now`: recompute `next_run` or
    /// complete.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        self.last_run = Some(now);
        self.updated_at = now;
        match &self.schedule {
            None => {
                self.status = ScheduleStatus::Completed;
                self.next_run = None;
            }
            Some(schedule) => match schedule.next_after(now)? {
                Some(next) => self.next_run = Some(next),
                None => {
                    self.status = ScheduleStatus::Completed;
                    self.next_run = None;
                }
            },
        }
        Ok(())
    }
}
