//! Public DTOs and enumerations crossing the ASH wire boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Proof binding mode (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// No server nonce; context id + binding + payload bind the proof.
    Balanced,
    /// Server-issued nonce additionally binds the proof.
    Strict,
}

/// Content type the canonicalizer dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    UrlEncoded,
}

impl ContentType {
    /// Parse a MIME type string, ignoring parameters (e.g. `; charset=utf-8`).
    pub fn from_mime(mime: &str) -> Option<Self> {
        let base = mime.split(';').next().unwrap_or("").trim();
        match base {
            "application/json" => Some(Self::Json),
            "application/x-www-form-urlencoded" => Some(Self::UrlEncoded),
            _ => None,
        }
    }
}

/// Opaque metadata map supplied by the context issuer. Never participates
/// in the proof.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Server-owned context record (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredContext {
    pub id: String,
    pub binding: String,
    pub mode: Mode,
    pub expires_at_ms: i64,
    pub used: bool,
    /// Hex-encoded random bytes; present iff `mode == Strict` (v1) or always
    /// for v2.1.
    pub nonce: Option<String>,
    pub metadata: Metadata,
}

/// DTO returned to the client on context issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPublicInfo {
    #[serde(rename = "contextId")]
    pub id: String,
    pub binding: String,
    pub mode: Mode,
    #[serde(rename = "expiresAt")]
    pub expires_at_ms: i64,
    /// Present in strict mode (v1, raw nonce) or always for v2.1 (derived
    /// `clientSecret` instead of the raw nonce).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Outcome of a `verify` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<crate::error::AshErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl VerifyResult {
    pub fn success(metadata: Metadata) -> Self {
        Self {
            valid: true,
            error_code: None,
            message: None,
            metadata: Some(metadata),
        }
    }

    pub fn failure(code: crate::error::AshErrorCode, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_code: Some(code),
            message: Some(message.into()),
            metadata: None,
        }
    }
}
