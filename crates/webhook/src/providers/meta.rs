//! Meta-family adapters: WhatsApp Business and Instagram Messaging.
//!
//! Both share the platform's envelope: an `X-Hub-Signature-256` header
//! (`sha256=<hex hmac>` of the raw body) and the `hub.challenge` GET
//! handshake. They differ in payload shape.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::adapter::{ChallengeResponse, WebhookAdapter};
use crate::event::NormalizedEvent;
use crate::signature::verify_hex;
use crate::header;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

fn verify_meta_signature(
    raw_body: &[u8],
    headers: &HashMap<String, String>,
    secret: &str,
) -> bool {
    let Some(signature) = header(headers, SIGNATURE_HEADER) else {
        return false;
    };
    let Some(hex_part) = signature.strip_prefix("sha256=") else {
        return false;
    };
    verify_hex(secret.as_bytes(), raw_body, hex_part)
}

/// Meta's subscription handshake: `hub.mode=subscribe` with a
/// `hub.challenge` to echo back.
fn meta_challenge(payload: &Value) -> Option<ChallengeResponse> {
    let mode = payload.get("hub.mode").and_then(Value::as_str)?;
    if mode != "subscribe" {
        return None;
    }
    let challenge = payload.get("hub.challenge").and_then(Value::as_str)?;
    Some(ChallengeResponse::text(challenge))
}

/// Seconds-resolution epoch string or number, as Meta sends them.
fn epoch_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let secs = match value? {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    // Instagram sends milliseconds in messaging entries.
    let secs = if secs > 100_000_000_000 { secs / 1000 } else { secs };
    Utc.timestamp_opt(secs, 0).single()
}

/// WhatsApp Business Cloud webhook adapter.
pub struct WhatsAppAdapter;

impl WebhookAdapter for WhatsAppAdapter {
    fn provider(&self) -> &'static str {
        "whatsapp"
    }

    fn verify_signature(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
        secret: &str,
    ) -> bool {
        verify_meta_signature(raw_body, headers, secret)
    }

    fn handle_challenge(&self, payload: &Value, _secret: &str) -> Option<ChallengeResponse> {
        meta_challenge(payload)
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

        let value = raw
            .pointer("/entry/0/changes/0/value")
            .cloned()
            .unwrap_or(Value::Null);

        // Inbound message.
        if let Some(message) = value.pointer("/messages/0") {
            return NormalizedEvent {
                provider: self.provider().to_string(),
                event_type: "message".to_string(),
                message_type: message
                    .get("type")
                    .and_then(Value::as_str)
                    .map(String::from),
                customer_id: message.get("from").and_then(Value::as_str).map(String::from),
                timestamp: epoch_timestamp(message.get("timestamp")).unwrap_or_else(Utc::now),
                data: message.clone(),
                raw,
                metadata: serde_json::json!({"client_id": client_id}),
            };
        }

        // Delivery/read status update.
        if let Some(status) = value.pointer("/statuses/0") {
            return NormalizedEvent {
                provider: self.provider().to_string(),
                event_type: "status".to_string(),
                message_type: status.get("status").and_then(Value::as_str).map(String::from),
                customer_id: status
                    .get("recipient_id")
                    .and_then(Value::as_str)
                    .map(String::from),
                timestamp: epoch_timestamp(status.get("timestamp")).unwrap_or_else(Utc::now),
                data: status.clone(),
                raw,
                metadata: serde_json::json!({"client_id": client_id}),
            };
        }

        NormalizedEvent::unknown(self.provider(), raw, client_id)
    }
}

/// Instagram Messaging webhook adapter.
pub struct InstagramAdapter;

impl WebhookAdapter for InstagramAdapter {
    fn provider(&self) -> &'static str {
        "instagram"
    }

    fn verify_signature(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
        secret: &str,
    ) -> bool {
        verify_meta_signature(raw_body, headers, secret)
    }

    fn handle_challenge(&self, payload: &Value, _secret: &str) -> Option<ChallengeResponse> {
        meta_challenge(payload)
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

        if let Some(messaging) = raw.pointer("/entry/0/messaging/0") {
            let event_type = if messaging.get("message").is_some() {
                "message"
            } else if messaging.get("reaction").is_some() {
                "reaction"
            } else if messaging.get("postback").is_some() {
                "postback"
            } else {
                "unknown"
            };
            if event_type != "unknown" {
                return NormalizedEvent {
                    provider: self.provider().to_string(),
                    event_type: event_type.to_string(),
                    message_type: messaging
                        .pointer("/message/attachments/0/type")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .or_else(|| {
                            messaging.get("message").map(|_| "text".to_string())
                        }),
                    customer_id: messaging
                        .pointer("/sender/id")
                        .and_then(Value::as_str)
                        .map(String::from),
                    timestamp: epoch_timestamp(messaging.get("timestamp"))
                        .unwrap_or_else(Utc::now),
                    data: messaging.clone(),
                    raw,
                    metadata: serde_json::json!({"client_id": client_id}),
                };
            }
        }

        NormalizedEvent::unknown(self.provider(), raw, client_id)
    }
}
