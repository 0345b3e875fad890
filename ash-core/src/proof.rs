//! Proof construction and verification, both wire variants (spec §4.3).
//!
//! v1: SHA-256 hash over a newline-delimited preimage, Base64URL-nopad
//! encoded. v2.1: a per-context client secret derived from the server
//! nonce via HMAC, and a proof that additionally binds to a millisecond
//! timestamp for freshness.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::types::Mode;

const ASH_VERSION_PREFIX: &str = "ASHv1";

fn mode_str(mode: Mode) -> &'static str {
    match mode {
        Mode::Balanced => "balanced",
        Mode::Strict => "strict",
    }
}

/// Base64URL (RFC 4648 §5), no padding.
pub fn base64url_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn base64url_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s)
}

/// Build the v1 proof:
///
/// ```text
/// proof = Base64URL-nopad( SHA256( "ASHv1\n" + mode + "\n" + binding + "\n"
///                                + contextId + "\n"
///                                + (nonce? + "\n") + canonicalPayload ) )
/// ```
///
/// The nonce segment (including its trailing newline) is present iff
/// `nonce` is `Some`.
pub fn build_proof_v1(
    mode: Mode,
    binding: &str,
    context_id: &str,
    nonce: Option<&str>,
    canonical_payload: &str,
) -> String {
    let mut preimage = String::new();
    preimage.push_str(ASH_VERSION_PREFIX);
    preimage.push('\n');
    preimage.push_str(mode_str(mode));
    preimage.push('\n');
    preimage.push_str(binding);
    preimage.push('\n');
    preimage.push_str(context_id);
    preimage.push('\n');
    if let Some(nonce) = nonce {
        preimage.push_str(nonce);
        preimage.push('\n');
    }
    preimage.push_str(canonical_payload);

    let digest = Sha256::digest(preimage.as_bytes());
    base64url_encode(&digest)
}

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(message);
    crate::hex::encode(mac.finalize().into_bytes())
}

/// Hex-encoded SHA-256 of the canonical payload, used as the body
/// component of the v2.1 proof.
pub fn body_hash(canonical_payload: &str) -> String {
    crate::hex::encode(Sha256::digest(canonical_payload.as_bytes()))
}

/// Derive the per-context client secret from the raw server nonce. The raw
/// nonce never leaves the server; this one-way derivation is what the
/// client actually receives in `ContextPublicInfo` for v2.1 contexts.
///
/// `clientSecret = HMAC_SHA256(nonceBytes, contextId + "|" + binding)`
pub fn derive_client_secret(nonce_hex: &str, context_id: &str, binding: &str) -> String {
    let message = format!("{context_id}|{binding}");
    hmac_sha256_hex(nonce_hex.as_bytes(), message.as_bytes())
}

/// Build the v2.1 proof:
///
/// `proof = HMAC_SHA256(clientSecret, timestamp + "|" + binding + "|" + bodyHash)`
pub fn build_proof_v2_1(
    client_secret_hex: &str,
    timestamp_ms: i64,
    binding: &str,
    body_hash_hex: &str,
) -> String {
    let message = format!("{timestamp_ms}|{binding}|{body_hash_hex}");
    hmac_sha256_hex(client_secret_hex.as_bytes(), message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_is_deterministic() {
        let a = build_proof_v1(Mode::Balanced, "POST /api/update", "ctx_1", None, r#"{"name":"John"}"#);
        let b = build_proof_v1(Mode::Balanced, "POST /api/update", "ctx_1", None, r#"{"name":"John"}"#);
        assert_eq!(a, b);
    }

    #[test]
    fn v1_nonce_segment_changes_proof() {
        let without = build_proof_v1(Mode::Strict, "POST /api/update", "ctx_1", None, "{}");
        let with = build_proof_v1(Mode::Strict, "POST /api/update", "ctx_1", Some("abc123"), "{}");
        assert_ne!(without, with);
    }

    #[test]
    fn v1_tamper_evidence() {
        let base = build_proof_v1(Mode::Balanced, "POST /api/update", "ctx_1", None, r#"{"amount":100}"#);
        let tampered = build_proof_v1(
            Mode::Balanced,
            "POST /api/update",
            "ctx_1",
            None,
            r#"{"amount":1000000}"#,
        );
        assert_ne!(base, tampered);
    }

    #[test]
    fn v1_proof_has_no_padding_or_plus_slash() {
        let proof = build_proof_v1(Mode::Balanced, "POST /x", "ctx_1", None, "{}");
        assert!(!proof.contains('='));
        assert!(!proof.contains('+'));
        assert!(!proof.contains('/'));
    }

    #[test]
    fn v2_1_client_secret_is_one_way_from_nonce() {
        let secret = derive_client_secret("deadbeef", "ash_1", "POST /api/update");
        // The derivation never reproduces the raw nonce hex.
        assert_ne!(secret, "deadbeef");
        assert_eq!(secret.len(), 64); // hex-encoded SHA-256 HMAC output
    }

    #[test]
    fn v2_1_proof_binds_timestamp() {
        let secret = derive_client_secret("deadbeef", "ash_1", "POST /api/update");
        let hash = body_hash("{}");
        let p1 = build_proof_v2_1(&secret, 1000, "POST /api/update", &hash);
        let p2 = build_proof_v2_1(&secret, 2000, "POST /api/update", &hash);
        assert_ne!(p1, p2);
    }

    #[test]
    fn v2_1_deterministic() {
        let secret = derive_client_secret("deadbeef", "ash_1", "POST /api/update");
        let hash = body_hash(r#"{"a":1}"#);
        let p1 = build_proof_v2_1(&secret, 42, "POST /api/update", &hash);
        let p2 = build_proof_v2_1(&secret, 42, "POST /api/update", &hash);
        assert_eq!(p1, p2);
    }

    #[test]
    fn body_hash_changes_with_payload() {
        assert_ne!(body_hash(r#"{"a":1}"#), body_hash(r#"{"a":2}"#));
    }
}
