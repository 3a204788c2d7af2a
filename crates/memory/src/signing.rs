//! HMAC-SHA256 signing over the canonical LTM payload, with a read-only
//! decoder for the legacy pipe-delimited format used before this project
//! switched to a length-prefixed encoding.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const PRESENT: u8 = 0x01;
const ABSENT: u8 = 0x00;

/// Length-prefixed, unambiguous encoding of `(content, topic, emotion,
/// timestamp)`. `content` and `timestamp` are always present; `topic` and
/// `emotion` may be absent, marked with a single `ABSENT` byte rather than a
/// zero-length string (a present-but-empty field and an absent field must
/// not collide).
pub fn canonical_payload(
    content: &str,
    topic: Option<&str>,
    emotion: Option<&str>,
    timestamp: &str,
) -> Vec<u8> {
    let mut buf = Vec::new();
    push_field(&mut buf, Some(content));
    push_field(&mut buf, topic);
    push_field(&mut buf, emotion);
    push_field(&mut buf, Some(timestamp));
    buf
}

fn push_field(buf: &mut Vec<u8>, field: Option<&str>) {
    match field {
        Some(value) => {
            buf.push(PRESENT);
            let bytes = value.as_bytes();
            buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            buf.extend_from_slice(bytes);
        }
        None => buf.push(ABSENT),
    }
}

/// The legacy pipe-delimited payload: `content|topic|emotion|timestamp`,
/// with the literal string `"None"` standing in for an absent field. Kept
/// as a read-only decoder for migration; never produced for new records.
fn legacy_payload(content: &str, topic: Option<&str>, emotion: Option<&str>, timestamp: &str) -> String {
    format!(
        "{content}|{}|{}|{timestamp}",
        topic.unwrap_or("None"),
        emotion.unwrap_or("None"),
    )
}

/// Sign the canonical payload with the given key, returning a hex string.
pub fn sign(
    key: &[u8],
    content: &str,
    topic: Option<&str>,
    emotion: Option<&str>,
    timestamp: &str,
) -> String {
    let payload = canonical_payload(content, topic, emotion, timestamp);
    hmac_hex(key, &payload)
}

fn hmac_hex(key: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(payload);
    format!("{:x}", mac.finalize().into_bytes())
}

/// Verify a signature against the canonical payload only (no legacy
/// fallback) — used once a store is known to be fully migrated.
pub fn verify(
    key: &[u8],
    content: &str,
    topic: Option<&str>,
    emotion: Option<&str>,
    timestamp: &str,
    signature: &str,
) -> bool {
    sign(key, content, topic, emotion, timestamp) == signature
}

/// Verify against the canonical payload, falling back to the legacy
/// pipe-delimited payload if the canonical check fails. Used during
/// migration and for any record that may predate the canonical format.
pub fn verify_with_legacy_fallback(
    key: &[u8],
    content: &str,
    topic: Option<&str>,
    emotion: Option<&str>,
    timestamp: &str,
    signature: &str,
) -> bool {
    if verify(key, content, topic, emotion, timestamp, signature) {
        return true;
    }
    let legacy = legacy_payload(content, topic, emotion, timestamp);
    hmac_hex(key, legacy.as_bytes()) == signature
}

/// SHA-256 hex fingerprint of a signing key, used for key-rotation
/// detection (`KeySettings::key_fingerprint`).
pub fn key_fingerprint(key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let key = b"a secret key at least 32 bytes long!!";
        let sig = sign(key, "hello world", Some("philosophy"), None, "2024-01-01T00:00:00Z");
        assert!(verify(key, "hello world", Some("philosophy"), None, "2024-01-01T00:00:00Z", &sig));
    }

    #[test]
    fn verify_fails_on_tampered_content() {
        let key = b"a secret key at least 32 bytes long!!";
        let sig = sign(key, "hello world", None, None, "2024-01-01T00:00:00Z");
        assert!(!verify(key, "goodbye world", None, None, "2024-01-01T00:00:00Z", &sig));
    }

    #[test]
    fn present_empty_field_differs_from_absent_field() {
        let key = b"a secret key at least 32 bytes long!!";
        let sig_absent = sign(key, "content", None, None, "ts");
        let sig_present_empty = sign(key, "content", Some(""), None, "ts");
        assert_ne!(sig_absent, sig_present_empty);
    }

    #[test]
    fn legacy_fallback_verifies_legacy_signature() {
        let key = b"a secret key at least 32 bytes long!!";
        let legacy = legacy_payload("hello", Some("topic"), None, "2024-01-01T00:00:00Z");
        let legacy_sig = hmac_hex(key, legacy.as_bytes());
        assert!(verify_with_legacy_fallback(
            key,
            "hello",
            Some("topic"),
            None,
            "2024-01-01T00:00:00Z",
            &legacy_sig
        ));
    }

    #[test]
    fn fingerprint_changes_with_key() {
        let a = key_fingerprint(b"key-one-at-least-32-bytes-long!!");
        let b = key_fingerprint(b"key-two-at-least-32-bytes-long!!");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
