//! Twitter Account Activity adapter.
//!
//! Signatures arrive in `X-Twitter-Webhooks-Signature` as
//! `sha256=<base64 hmac>` (some integrations send hex); the CRC handshake
//! answers a `crc_token` with `sha256=<base64 hmac(secret, token)>`.

use std::collections::HashMap;

use base64::Engine;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::adapter::{ChallengeResponse, WebhookAdapter};
use crate::event::NormalizedEvent;
use crate::header;
use crate::signature::{hmac_sha256, verify_base64, verify_hex};

const SIGNATURE_HEADER: &str = "x-twitter-webhooks-signature";

/// Twitter Account Activity webhook adapter.
pub struct TwitterAdapter;

impl WebhookAdapter for TwitterAdapter {
    fn provider(&self) -> &'static str {
        "twitter"
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
        let Some(encoded) = signature.strip_prefix("sha256=") else {
            return false;
        };
        verify_base64(secret.as_bytes(), raw_body, encoded)
            || verify_hex(secret.as_bytes(), raw_body, encoded)
    }

    fn handle_challenge(&self, payload: &Value, secret: &str) -> Option<ChallengeResponse> {
        let token = payload.get("crc_token").and_then(Value::as_str)?;
        let mac = hmac_sha256(secret.as_bytes(), token.as_bytes());
        let response_token = base64::engine::general_purpose::STANDARD.encode(mac);
        Some(ChallengeResponse::json(
            serde_json::json!({"response_token": format!("sha256={response_token}")})
                .to_string(),
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

        // Direct message.
        if let Some(dm) = raw.pointer("/direct_message_events/0") {
            let timestamp = dm
                .get("created_timestamp")
                .and_then(Value::as_str)
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .unwrap_or_else(Utc::now);
            return NormalizedEvent {
                provider: self.provider().to_string(),
                event_type: "direct_message".to_string(),
                message_type: dm.get("type").and_then(Value::as_str).map(String::from),
                customer_id: dm
                    .pointer("/message_create/sender_id")
                    .and_then(Value::as_str)
                    .map(String::from),
                timestamp,
                data: dm.clone(),
                raw,
                metadata: serde_json::json!({"client_id": client_id}),
            };
        }

        // Mention / tweet creation.
        if let Some(tweet) = raw.pointer("/tweet_create_events/0") {
            return NormalizedEvent {
                provider: self.provider().to_string(),
                event_type: "tweet_create".to_string(),
                message_type: None,
                customer_id: tweet
                    .pointer("/user/id_str")
                    .and_then(Value::as_str)
                    .map(String::from),
                timestamp: Utc::now(),
                data: tweet.clone(),
                raw,
                metadata: serde_json::json!({"client_id": client_id}),
            };
        }

        NormalizedEvent::unknown(self.provider(), raw, client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn signed_headers_b64(secret: &str, body: &[u8]) -> HashMap<String, String> {
        let mac = hmac_sha256(secret.as_bytes(), body);
        let mut headers = HashMap::new();
        headers.insert(
            "X-Twitter-Webhooks-Signature".to_string(),
            format!(
                "sha256={}",
                base64::engine::general_purpose::STANDARD.encode(mac)
            ),
        );
        headers
    }

    #[test]
    fn base64_signature_verifies() {
        let body = br#"{"for_user_id":"1"}"#;
        let headers = signed_headers_b64("secret", body);
        assert!(TwitterAdapter.verify_signature(body, &headers, "secret"));
        assert!(!TwitterAdapter.verify_signature(body, &headers, "other"));
    }

    #[test]
    fn hex_signature_also_verifies() {
        let body = b"{}";
        let mac = hmac_sha256(b"secret", body);
        let mut headers = HashMap::new();
        headers.insert(
            "x-twitter-webhooks-signature".to_string(),
            format!("sha256={}", hex::encode(mac)),
        );
        assert!(TwitterAdapter.verify_signature(body, &headers, "secret"));
    }

    #[test]
    fn crc_challenge_computes_response_token() {
        let payload = json!({"crc_token": "challenge-me"});
        let response = TwitterAdapter.handle_challenge(&payload, "secret").unwrap();
        let body: Value = serde_json::from_str(&response.body).unwrap();
        let token = body["response_token"].as_str().unwrap();

        let expected = base64::engine::general_purpose::STANDARD
            .encode(hmac_sha256(b"secret", b"challenge-me"));
        assert_eq!(token, format!("sha256={expected}"));

        assert!(TwitterAdapter.handle_challenge(&json!({}), "secret").is_none());
    }

    #[test]
    fn direct_message_normalizes() {
        let body = json!({
            "for_user_id": "100",
            "direct_message_events": [{
                "type": "message_create",
                "id": "dm-1",
                "created_timestamp": "1700000000000",
                "message_create": {
                    "sender_id": "200",
                    "target": {"recipient_id": "100"},
                    "message_data": {"text": "hey"},
                },
            }],
        });
        let event = TwitterAdapter.normalize(body.to_string().as_bytes(), &HashMap::new(), "c");
        assert_eq!(event.event_type, "direct_message");
        assert_eq!(event.customer_id.as_deref(), Some("200"));
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn tweet_create_normalizes() {
        let body = json!({
            "for_user_id": "100",
            "tweet_create_events": [{"user": {"id_str": "300"}, "text": "@bot hi"}],
        });
        let event = TwitterAdapter.normalize(body.to_string().as_bytes(), &HashMap::new(), "c");
        assert_eq!(event.event_type, "tweet_create");
        assert_eq!(event.customer_id.as_deref(), Some("300"));
    }

    #[test]
    fn unrecognized_payload_is_unknown() {
        let event = TwitterAdapter.normalize(b"{\"follow_events\":[]}", &HashMap::new(), "c");
        assert!(event.is_unknown());
    }
}
