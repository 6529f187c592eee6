//! Server configuration from the environment.

use gantry_engine::EngineConfig;
use serde::{Deserialize, Serialize};

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_scheduler_interval_ms() -> u64 {
    1_000
}

/// Process configuration for `gantry-server`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Scheduler tick interval in milliseconds.
    #[serde(default = "default_scheduler_interval_ms")]
    pub scheduler_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            engine: EngineConfig::default(),
            scheduler_interval_ms: default_scheduler_interval_ms(),
        }
    }
}

impl ServerConfig {
    /// Load from the environment: `GANTRY_BIND`, plus an optional
    /// `GANTRY_CONFIG` pointing at a JSON file.
    pub fn from_env() -> Self {
        let mut config: Self = std::env::var("GANTRY_CONFIG")
            .ok()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        if let Ok(bind) = std::env::var("GANTRY_BIND") {
            config.bind = bind;
        }
        config
    }
}
