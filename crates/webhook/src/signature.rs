//! Shared HMAC-SHA256 signature primitives.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute `HMAC-SHA256(secret, message)`.
#[must_use]
pub fn hmac_sha256(secret: &[u8], message: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time equality over raw bytes.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Verify a hex-encoded HMAC-SHA256 signature over `message`.
#[must_use]
pub fn verify_hex(secret: &[u8], message: &[u8], hex_signature: &str) -> bool {
    let Ok(expected) = hex::decode(hex_signature) else {
        return false;
    };
    constant_time_eq(&hmac_sha256(secret, message), &expected)
}

/// Verify a base64-encoded HMAC-SHA256 signature over `message`.
#[must_use]
pub fn verify_base64(secret: &[u8], message: &[u8], b64_signature: &str) -> bool {
    use base64::Engine;
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(b64_signature) else {
        return false;
    };
    constant_time_eq(&hmac_sha256(secret, message), &expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip_verifies() {
        let mac = hmac_sha256(b"secret", b"body");
        assert!(verify_hex(b"secret", b"body", &hex::encode(&mac)));
    }

    #[test]
    fn base64_roundtrip_verifies() {
        use base64::Engine;
        let mac = hmac_sha256(b"secret", b"body");
        let b64 = base64::engine::general_purpose::STANDARD.encode(&mac);
        assert!(verify_base64(b"secret", b"body", &b64));
    }

    #[test]
    fn tampered_body_fails() {
        let mac = hmac_sha256(b"secret", b"body");
        assert!(!verify_hex(b"secret", b"bodY", &hex::encode(&mac)));
    }

    #[test]
    fn wrong_secret_fails() {
        let mac = hmac_sha256(b"secret", b"body");
        assert!(!verify_hex(b"other", b"body", &hex::encode(mac)));
    }

    #[test]
    fn malformed_encodings_fail_closed() {
        assert!(!verify_hex(b"secret", b"body", "not-hex!"));
        assert!(!verify_base64(b"secret", b"body", "@@@@"));
    }

    #[test]
    fn length_mismatch_is_unequal() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abc", b"abc"));
    }
}
