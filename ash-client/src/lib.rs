//! ASH client SDK.
//!
//! # Example
//!
//! ```no_run
//! use ash_client::AshClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = AshClient::connect_v1("127.0.0.1:9443").await?;
//!
//!     let ctx = client.issue_context("POST", "/api/update", 30_000, Default::default()).await?;
//!     let result = client
//!         .protected_request(&ctx, "application/json", br#"{"name":"John"}"#)
//!         .await?;
//!     println!("valid: {}", result.valid);
//!
//!     Ok(())
//! }
//! ```

mod connection;

pub use connection::{Connection, ConnectionConfig};

use std::net::SocketAddr;

use chrono::Utc;

use ash_core::wire::{ClientMessage, IssueContextRequest, ProtectedRequest, ServerMessage};
use ash_core::{
    base64url_encode, body_hash, build_proof_v1, build_proof_v2_1, canonicalize, AshError,
    AshResult, ContentType, ContextPublicInfo, Metadata, Mode, VerifyResult,
};

/// Which wire variant this client speaks — must match the server's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientVariant {
    V1,
    V2_1,
}

/// High-level ASH client: issues contexts and builds proofs for protected
/// requests over a length-prefixed TCP/TLS connection.
pub struct AshClient {
    connection: Connection,
    variant: ClientVariant,
}

impl AshClient {
    /// Connect to an ASH server speaking the v1 wire variant (plaintext).
    pub async fn connect_v1(addr: impl AsRef<str>) -> AshResult<Self> {
        Self::connect(addr, ClientVariant::V1).await
    }

    /// Connect to an ASH server speaking the v2.1 wire variant (plaintext).
    pub async fn connect_v2_1(addr: impl AsRef<str>) -> AshResult<Self> {
        Self::connect(addr, ClientVariant::V2_1).await
    }

    async fn connect(addr: impl AsRef<str>, variant: ClientVariant) -> AshResult<Self> {
        let addr: SocketAddr = addr
            .as_ref()
            .parse()
            .map_err(|e| AshError::Transport(format!("Invalid address: {}", e)))?;

        let config = ConnectionConfig::plaintext(addr);
        let connection = Connection::connect(&config).await?;

        Ok(Self { connection, variant })
    }

    /// Connect to an ASH server over TLS.
    pub async fn connect_tls(
        addr: impl AsRef<str>,
        server_name: impl Into<String>,
        variant: ClientVariant,
    ) -> AshResult<Self> {
        let addr: SocketAddr = addr
            .as_ref()
            .parse()
            .map_err(|e| AshError::Transport(format!("Invalid address: {}", e)))?;

        let config = ConnectionConfig::tls(addr, server_name);
        let connection = Connection::connect(&config).await?;

        Ok(Self { connection, variant })
    }

    /// Ask the server to issue a context for `method path`.
    pub async fn issue_context(
        &mut self,
        method: impl Into<String>,
        path: impl Into<String>,
        ttl_ms: i64,
        metadata: Metadata,
    ) -> AshResult<ContextPublicInfo> {
        let mode = match self.variant {
            ClientVariant::V1 => Mode::Balanced,
            ClientVariant::V2_1 => Mode::Strict,
        };

        let request = ClientMessage::IssueContext(IssueContextRequest {
            method: method.into(),
            path: path.into(),
            ttl_ms: Some(ttl_ms),
            mode: Some(mode),
            metadata,
        });

        match self.connection.send_request(&request).await? {
            ServerMessage::Context(info) => Ok(info),
            ServerMessage::Error { message } => Err(AshError::Transport(message)),
            ServerMessage::Verified(_) => Err(AshError::Transport(
                "unexpected verify response to issue_context".to_string(),
            )),
        }
    }

    /// Build the proof for `ctx` and send a protected request with the
    /// given payload.
    pub async fn protected_request(
        &mut self,
        ctx: &ContextPublicInfo,
        content_type: &str,
        payload: &[u8],
    ) -> AshResult<VerifyResult> {
        let ct = ContentType::from_mime(content_type)
            .ok_or_else(|| AshError::Transport(format!("unsupported content type: {content_type}")))?;
        let canonical = canonicalize(ct, payload)?;

        let (proof, timestamp_ms) = match self.variant {
            ClientVariant::V1 => {
                let proof = build_proof_v1(
                    ctx.mode,
                    &ctx.binding,
                    &ctx.id,
                    ctx.nonce.as_deref(),
                    &canonical,
                );
                (proof, None)
            }
            ClientVariant::V2_1 => {
                let client_secret = ctx.nonce.as_deref().ok_or_else(|| {
                    AshError::Transport("v2.1 context is missing its client secret".to_string())
                })?;
                let ts = Utc::now().timestamp_millis();
                let hash = body_hash(&canonical);
                let proof = build_proof_v2_1(client_secret, ts, &ctx.binding, &hash);
                (proof, Some(ts))
            }
        };

        let request = ClientMessage::Protected(ProtectedRequest {
            context_id: ctx.id.clone(),
            proof,
            method: ctx.binding.split(' ').next().unwrap_or("").to_string(),
            path: ctx.binding.splitn(2, ' ').nth(1).unwrap_or("/").to_string(),
            content_type: content_type.to_string(),
            payload_b64: base64url_encode(payload),
            timestamp_ms,
        });

        match self.connection.send_request(&request).await? {
            ServerMessage::Verified(result) => Ok(result),
            ServerMessage::Error { message } => Err(AshError::Transport(message)),
            ServerMessage::Context(_) => Err(AshError::Transport(
                "unexpected context response to protected_request".to_string(),
            )),
        }
    }
}
