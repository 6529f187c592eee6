//! Engine configuration.

use std::time::Duration;

use gantry_execution::RunConfig;
use serde::{Deserialize, Serialize};

fn default_workers() -> usize {
    4
}

fn default_lane_watermark() -> usize {
    256
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}

/// Process-level engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of worker tasks consuming the queue.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Default per-run budgets; overridable per trigger.
    #[serde(default)]
    pub run: RunConfig,
    /// Per-lane pending-work watermark; above it new triggers for the
    /// tenant are deferred instead of admitted.
    #[serde(default = "default_lane_watermark")]
    pub lane_watermark: usize,
    /// Upper bound on the exponential retry backoff.
    #[serde(default = "default_max_backoff", with = "gantry_core::serde_duration_ms")]
    pub max_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            run: RunConfig::default(),
            lane_watermark: default_lane_watermark(),
            max_backoff: default_max_backoff(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.lane_watermark, 256);
        assert_eq!(config.max_backoff, Duration::from_secs(60));
    }

    #[test]
    fn deserializes_from_empty_object() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
