//! Strategy errors and validation reports.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failed node execution attempt.
///
/// `retryable` feeds the engine's retry policy: only errors a strategy
/// declares retryable are eligible for re-enqueueing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StrategyError {
    /// What went wrong, sanitized for API exposure.
    pub message: String,
    /// Whether the engine may retry this attempt.
    pub retryable: bool,
}

impl StrategyError {
    /// An error the engine may retry (network hiccup, 5xx, timeout).
    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: true }
    }

    /// An error that will not improve with retries (bad config, 4xx,
    /// evaluation failure).
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: false }
    }
}

/// A single field-level validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// The offending configuration field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

/// The outcome of validating a node's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Zero or more field-level errors.
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    /// An empty (passing) report.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// Record a field-level error.
    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError { field: field.into(), message: message.into() });
    }

    /// Returns `true` if no errors were recorded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Merge another report's errors into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flag() {
        assert!(StrategyError::retryable("connection reset").retryable);
        assert!(!StrategyError::permanent("missing url").retryable);
    }

    #[test]
    fn error_display_is_message_only() {
        let err = StrategyError::permanent("missing url");
        assert_eq!(err.to_string(), "missing url");
    }

    #[test]
    fn report_accumulates_errors() {
        let mut report = ValidationReport::ok();
        assert!(report.is_ok());
        report.error("url", "required");
        report.error("method", "unsupported");
        assert!(!report.is_ok());
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].field, "url");
    }

    #[test]
    fn merge_combines_reports() {
        let mut a = ValidationReport::ok();
        a.error("x", "bad");
        let mut b = ValidationReport::ok();
        b.error("y", "worse");
        a.merge(b);
        assert_eq!(a.errors.len(), 2);
    }
}
