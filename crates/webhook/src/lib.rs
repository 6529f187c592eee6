#![forbid(unsafe_code)]

//! # Gantry Webhook
//!
//! Provider-specific adapters for inbound webhooks. Each adapter is purely
//! functional and exposes three operations:
//!
//! - `verify_signature` — constant-time HMAC-SHA256 comparison; time-bound
//!   schemes (Slack) also reject requests older than a fixed window,
//! - `handle_challenge` — the provider's one-shot verification handshake,
//! - `normalize` — provider payload to a uniform [`NormalizedEvent`];
//!   unrecognized payloads yield `event_type = "unknown"` with the raw
//!   payload preserved.
//!
//! Recognized providers: WhatsApp and Instagram (Meta family), Slack, and
//! Twitter. The ingress layer routes normalized events to trigger nodes.

pub mod adapter;
pub mod event;
pub mod providers;
pub mod signature;

pub use adapter::{adapter_for, ChallengeResponse, WebhookAdapter};
pub use event::NormalizedEvent;
pub use providers::{InstagramAdapter, SlackAdapter, TwitterAdapter, WhatsAppAdapter};

use std::collections::HashMap;

/// Case-insensitive header lookup over a plain string map.
///
/// The ingress layer lowercases header names once; adapters stay free of
/// any HTTP framework types.
#[must_use]
pub fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("X-Hub-Signature-256".to_string(), "sha256=abc".to_string());
        assert_eq!(header(&headers, "x-hub-signature-256"), Some("sha256=abc"));
        assert_eq!(header(&headers, "X-HUB-SIGNATURE-256"), Some("sha256=abc"));
        assert_eq!(header(&headers, "x-other"), None);
    }
}
