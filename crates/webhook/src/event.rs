//! The uniform event all adapters normalize into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A provider webhook payload, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Provider tag: `whatsapp`, `instagram`, `slack`, `twitter`.
    pub provider: String,
    /// Provider-scoped event type; `unknown` when unrecognized.
    pub event_type: String,
    /// The message kind, when the event carries one (text, image, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// The end customer the event concerns (sender id, user id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Event time: the provider's timestamp when present, receive time
    /// otherwise.
    pub timestamp: DateTime<Utc>,
    /// The salient extracted data.
    pub data: Value,
    /// The full raw payload, preserved for audit and reprocessing.
    pub raw: Value,
    /// Ingress metadata (client id, channel hints).
    #[serde(default)]
    pub metadata: Value,
}

impl NormalizedEvent {
    /// An `unknown` event preserving the raw payload.
    #[must_use]
    pub fn unknown(provider: &str, raw: Value, client_id: &str) -> Self {
        Self {
            provider: provider.to_string(),
            event_type: "unknown".to_string(),
            message_type: None,
            customer_id: None,
            timestamp: Utc::now(),
            data: Value::Null,
            raw,
            metadata: serde_json::json!({"client_id": client_id}),
        }
    }

    /// Returns `true` if the payload was not recognized.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.event_type == "unknown"
    }
}
