//! Slack Events API adapter.
//!
//! Signature scheme v0: `X-Slack-Signature = v0=<hex hmac>` over the
//! basestring `v0:<timestamp>:<body>`, with `X-Slack-Request-Timestamp`
//! bounded to a five-minute window against replay.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::adapter::{ChallengeResponse, WebhookAdapter};
use crate::event::NormalizedEvent;
use crate::header;
use crate::signature::verify_hex;

const SIGNATURE_HEADER: &str = "x-slack-signature";
const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Maximum accepted clock skew in seconds.
const STALENESS_WINDOW_SECS: i64 = 300;

/// Slack Events API webhook adapter.
pub struct SlackAdapter;

impl WebhookAdapter for SlackAdapter {
    fn provider(&self) -> &'static str {
        "slack"
    }

    fn verify_signature(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
        secret: &str,
    ) -> bool {
        let Some(signature) = header(headers, SIGNATURE_HEADER) else {
            return false;
        };
        let Some(timestamp) = header(headers, TIMESTAMP_HEADER) else {
            return false;
        };
        let Ok(ts) = timestamp.parse::<i64>() else {
            return false;
        };
        if (Utc::now().timestamp() - ts).abs() > STALENESS_WINDOW_SECS {
            return false;
        }
        let Some(hex_part) = signature.strip_prefix("v0=") else {
            return false;
        };

        let mut basestring = Vec::with_capacity(raw_body.len() + timestamp.len() + 4);
        basestring.extend_from_slice(b"v0:");
        basestring.extend_from_slice(timestamp.as_bytes());
        basestring.push(b':');
        basestring.extend_from_slice(raw_body);

        verify_hex(secret.as_bytes(), &basestring, hex_part)
    }

    fn handle_challenge(&self, payload: &Value, _secret: &str) -> Option<ChallengeResponse> {
        if payload.get("type").and_then(Value::as_str) != Some("url_verification") {
            return None;
        }
        let challenge = payload.get("challenge").and_then(Value::as_str)?;
        Some(ChallengeResponse::json(
            serde_json::json!({"challenge": challenge}).to_string(),
        ))
    }

    fn normalize(
        &self,
        raw_body: &[u8],
        _headers: &HashMap<String, String>,
        client_id: &str,
    ) -> NormalizedEvent {
        let Ok(raw) = serde_json::from_slice::<Value>(raw_body) else {
            return NormalizedEvent::unknown(self.provider(), Value::Null, client_id);
        };

        if raw.get("type").and_then(Value::as_str) == Some("event_callback") {
            if let Some(event) = raw.get("event") {
                let event_type = event
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                if event_type != "unknown" {
                    // Slack `ts` is "seconds.micros" as a string.
                    let timestamp = event
                        .get("ts")
                        .and_then(Value::as_str)
                        .and_then(|ts| ts.split('.').next())
                        .and_then(|secs| secs.parse::<i64>().ok())
                        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                        .unwrap_or_else(Utc::now);
                    return NormalizedEvent {
                        provider: self.provider().to_string(),
                        event_type,
                        message_type: event
                            .get("subtype")
                            .and_then(Value::as_str)
                            .map(String::from),
                        customer_id: event.get("user").and_then(Value::as_str).map(String::from),
                        timestamp,
                        data: event.clone(),
                        raw,
                        metadata: serde_json::json!({"client_id": client_id}),
                    };
                }
            }
        }

        NormalizedEvent::unknown(self.provider(), raw, client_id)
    }
}
