//! The adapter contract and provider lookup.

use std::collections::HashMap;

use serde_json::Value;

use crate::event::NormalizedEvent;
use crate::providers::{InstagramAdapter, SlackAdapter, TwitterAdapter, WhatsAppAdapter};

/// A provider's answer to its verification handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse {
    /// The body to send back verbatim.
    pub body: String,
    /// The content type of the response body.
    pub content_type: &'static str,
}

impl ChallengeResponse {
    /// A plaintext challenge echo.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self { body: body.into(), content_type: "text/plain" }
    }

    /// A JSON challenge response.
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self { body: body.into(), content_type: "application/json" }
    }
}

/// A provider-specific webhook adapter. Purely functional: no I/O.
pub trait WebhookAdapter: Send + Sync {
    /// The provider tag this adapter handles.
    fn provider(&self) -> &'static str;

    /// Verify the request signature. Constant-time comparison; time-bound
    /// schemes also reject stale requests.
    fn verify_signature(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
        secret: &str,
    ) -> bool;

    /// Detect and answer the provider's one-shot verification handshake.
    /// `payload` is the parsed JSON body, or the query parameters as an
    /// object for GET-style handshakes. Returns `None` when the request is
    /// not a challenge.
    fn handle_challenge(&self, payload: &Value, secret: &str) -> Option<ChallengeResponse>;

    /// Normalize a raw payload into the uniform event shape. Unrecognized
    /// payloads yield `event_type = "unknown"` with the raw body kept.
    fn normalize(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
        client_id: &str,
    ) -> NormalizedEvent;
}

/// Look up the adapter for a provider path segment.
#[must_use]
pub fn adapter_for(provider: &str) -> Option<Box<dyn WebhookAdapter>> {
    match provider {
        "whatsapp" => Some(Box::new(WhatsAppAdapter)),
        "instagram" => Some(Box::new(InstagramAdapter)),
        "slack" => Some(Box::new(SlackAdapter)),
        "twitter" => Some(Box::new(TwitterAdapter)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_resolve() {
        for provider in ["whatsapp", "instagram", "slack", "twitter"] {
            let adapter = adapter_for(provider).unwrap();
            assert_eq!(adapter.provider(), provider);
        }
    }

    #[test]
    fn unknown_provider_is_none() {
        assert!(adapter_for("telegram").is_none());
    }
}
