//! Per-run execution configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_cancel_grace() -> Duration {
    Duration::from_secs(2)
}

/// Retry, timeout, and cancellation budgets for one run.
///
/// Nodes may override `max_retries` and `timeout` through their config
/// (`max_retries`, `timeout_ms`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum retries per node (attempts = retries + 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay seeding the exponential retry backoff.
    #[serde(default = "default_retry_delay", with = "gantry_core::serde_duration_ms")]
    pub retry_delay: Duration,
    /// Wall-clock bound for a single node execution.
    #[serde(default = "default_timeout", with = "gantry_core::serde_duration_ms")]
    pub timeout: Duration,
    /// How long a cancelled strategy gets to return before its slot is
    /// reclaimed.
    #[serde(default = "default_cancel_grace", with = "gantry_core::serde_duration_ms")]
    pub cancel_grace: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            timeout: default_timeout(),
            cancel_grace: default_cancel_grace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.cancel_grace, Duration::from_secs(2));
    }

    #[test]
    fn serde_uses_milliseconds() {
        let config = RunConfig {
            max_retries: 2,
            retry_delay: Duration::from_millis(250),
            timeout: Duration::from_secs(5),
            cancel_grace: Duration::from_millis(500),
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["retry_delay"], serde_json::json!(250));
        assert_eq!(json["timeout"], serde_json::json!(5000));

        let back: RunConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
    }
}
