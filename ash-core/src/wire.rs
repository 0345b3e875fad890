//! Wire message envelopes shared by the demonstration server and client
//! transports. These are not part of the protocol engine proper (spec §1
//! scopes HTTP framework adapters out) — they are the DTOs a length-
//! prefixed demo transport uses to carry `issue_context`/`verify` calls,
//! analogous to the JSON shapes in spec §6.

use serde::{Deserialize, Serialize};

use crate::types::{ContextPublicInfo, Metadata, Mode, VerifyResult};

/// Request to issue a new context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueContextRequest {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A protected request: the context id and proof produced client-side,
/// plus the observed binding and payload the server re-derives the proof
/// from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedRequest {
    pub context_id: String,
    pub proof: String,
    pub method: String,
    pub path: String,
    pub content_type: String,
    /// Canonical-form-independent raw payload bytes, base64url (no-pad)
    /// encoded so the envelope stays valid JSON regardless of payload
    /// content type.
    pub payload_b64: String,
    /// Required for the v2.1 variant; ignored by v1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
}

/// One message kind per direction, tagged so the length-prefixed demo
/// transport can dispatch without a second read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientMessage {
    IssueContext(IssueContextRequest),
    Protected(ProtectedRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerMessage {
    Context(ContextPublicInfo),
    Verified(VerifyResult),
    /// Transport-level failure that never reached `verify` (e.g. malformed
    /// envelope) — distinct from the closed `VerifyResult` error set.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_round_trips() {
        let msg = ClientMessage::IssueContext(IssueContextRequest {
            method: "POST".to_string(),
            path: "/api/update".to_string(),
            ttl_ms: Some(30_000),
            mode: Some(Mode::Balanced),
            metadata: Default::default(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            ClientMessage::IssueContext(req) => assert_eq!(req.path, "/api/update"),
            _ => panic!("wrong variant"),
        }
    }
}
