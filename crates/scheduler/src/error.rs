//! Scheduler errors.

use thiserror::Error;

/// Errors produced while validating or evaluating schedules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The cron expression could not be parsed.
    #[error("invalid cron expression {expression:?}: {message}")]
    InvalidCron {
        /// The offending expression.
        expression: String,
        /// Parser detail.
        message: String,
    },

    /// The timezone is not a known IANA name.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}
