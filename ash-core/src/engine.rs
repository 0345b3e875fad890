//! The `Ash` engine: orchestrates issue/verify, enforces the ordering of
//! checks from spec §4.5, and emits the closed set of typed errors.
//!
//! The engine is stateless and reentrant — all mutable state lives in the
//! `ContextStore` — so a single instance may be shared across every
//! concurrent request handler (spec §5).

use std::sync::Arc;

use crate::binding::normalize_binding;
use crate::canonicalize::canonicalize;
use crate::clock::Clock;
use crate::compare::constant_time_str_eq;
use crate::error::AshErrorCode;
use crate::proof::{body_hash, build_proof_v1, build_proof_v2_1, derive_client_secret};
use crate::store::ContextStore;
use crate::types::{ContentType, ContextPublicInfo, Metadata, Mode, VerifyResult};

/// Which wire proof construction this engine instance speaks. Per spec §9
/// Open Question (b), v1 and v2.1 are treated as separate wire protocols
/// selected per endpoint/engine rather than negotiated in-band.
pub enum Variant {
    V1,
    /// `max_clock_skew_ms` bounds how far a client-supplied `timestamp_ms`
    /// may drift from the server's clock before the proof is rejected.
    V2_1 { max_clock_skew_ms: i64 },
}

pub struct Ash {
    store: Arc<dyn ContextStore>,
    clock: Arc<dyn Clock>,
    variant: Variant,
}

impl Ash {
    pub fn new(store: Arc<dyn ContextStore>, clock: Arc<dyn Clock>, variant: Variant) -> Self {
        Self {
            store,
            clock,
            variant,
        }
    }

    pub fn new_v1(store: Arc<dyn ContextStore>, clock: Arc<dyn Clock>) -> Self {
        Self::new(store, clock, Variant::V1)
    }

    pub fn new_v2_1(store: Arc<dyn ContextStore>, clock: Arc<dyn Clock>, max_clock_skew_ms: i64) -> Self {
        Self::new(store, clock, Variant::V2_1 { max_clock_skew_ms })
    }

    /// Issue a new context for `method path`. Normalizes the binding,
    /// delegates to the store, and returns the public DTO (nonce present
    /// only in strict/v2.1 modes; v2.1 exposes the derived client secret,
    /// never the raw nonce).
    pub async fn issue_context(
        &self,
        method: &str,
        path: &str,
        ttl_ms: i64,
        mode: Mode,
        metadata: Metadata,
    ) -> crate::error::AshResult<ContextPublicInfo> {
        let binding = normalize_binding(method, path);
        let record = self.store.create(&binding, ttl_ms, mode, metadata).await?;

        tracing::debug!(context_id = %record.id, binding = %record.binding, "issued context");

        let nonce = match (&self.variant, &record.nonce) {
            (Variant::V1, raw) => raw.clone(),
            (Variant::V2_1 { .. }, Some(raw)) => {
                Some(derive_client_secret(raw, &record.id, &record.binding))
            }
            (Variant::V2_1 { .. }, None) => None,
        };

        Ok(ContextPublicInfo {
            id: record.id,
            binding: record.binding,
            mode: record.mode,
            expires_at_ms: record.expires_at_ms,
            nonce,
        })
    }

    /// Verify a protected request against its context. Implements the
    /// seven-step ordered pipeline from spec §4.5; the first failure
    /// encountered short-circuits the remaining steps. `timestamp_ms` is
    /// the client-supplied millisecond timestamp used only by the v2.1
    /// variant.
    pub async fn verify(
        &self,
        context_id: &str,
        client_proof: &str,
        observed_method: &str,
        observed_path: &str,
        raw_payload: &[u8],
        content_type: &str,
        timestamp_ms: Option<i64>,
    ) -> VerifyResult {
        // Step 1: context must exist (and not be expired, per store contract).
        let record = match self.store.get(context_id).await {
            Some(record) => record,
            None => {
                return VerifyResult::failure(AshErrorCode::InvalidContext, "unknown context")
            }
        };

        // Step 2: explicit expiry re-check (defensive: the store already
        // hides expired records from `get`, but the ordering in the spec
        // is security-relevant and we keep it visible here).
        let now = self.clock.now_ms();
        if now >= record.expires_at_ms {
            return VerifyResult::failure(AshErrorCode::ContextExpired, "context expired");
        }

        // Step 3: replay pre-check (stale read is fine — step 7 re-confirms
        // atomically).
        if record.used {
            return VerifyResult::failure(AshErrorCode::ReplayDetected, "context already used");
        }

        // Step 4: binding must match exactly.
        let observed_binding = normalize_binding(observed_method, observed_path);
        if observed_binding != record.binding {
            return VerifyResult::failure(
                AshErrorCode::EndpointMismatch,
                "binding does not match issued context",
            );
        }

        // Step 5: canonicalize the observed payload.
        let content_type = match ContentType::from_mime(content_type) {
            Some(ct) => ct,
            None => {
                return VerifyResult::failure(
                    AshErrorCode::UnsupportedContentType,
                    format!("unsupported content type: {content_type}"),
                )
            }
        };
        let canonical_payload = match canonicalize(content_type, raw_payload) {
            Ok(payload) => payload,
            Err(err) => {
                return VerifyResult::failure(AshErrorCode::CanonicalizationFailed, err.to_string())
            }
        };

        // Step 6: recompute the expected proof and compare in constant time.
        let expected_proof = match &self.variant {
            Variant::V1 => build_proof_v1(
                record.mode,
                &record.binding,
                &record.id,
                record.nonce.as_deref(),
                &canonical_payload,
            ),
            Variant::V2_1 { max_clock_skew_ms } => {
                let Some(ts) = timestamp_ms else {
                    return VerifyResult::failure(
                        AshErrorCode::IntegrityFailed,
                        "v2.1 proofs require a timestamp",
                    );
                };
                if (now - ts).abs() > *max_clock_skew_ms {
                    return VerifyResult::failure(
                        AshErrorCode::IntegrityFailed,
                        "timestamp outside freshness window",
                    );
                }
                // A v2.1 context without a nonce means the store failed to
                // honor the "always generate" policy (spec §3) — there is no
                // secret to derive a proof from, so the proof can never be
                // correct. Treat it as an integrity failure rather than
                // silently deriving from an empty key.
                let Some(raw_nonce) = record.nonce.as_deref() else {
                    return VerifyResult::failure(
                        AshErrorCode::IntegrityFailed,
                        "v2.1 context is missing its nonce",
                    );
                };
                let client_secret = derive_client_secret(raw_nonce, &record.id, &record.binding);
                let hash = body_hash(&canonical_payload);
                build_proof_v2_1(&client_secret, ts, &record.binding, &hash)
            }
        };

        if !constant_time_str_eq(&expected_proof, client_proof) {
            tracing::debug!(context_id = %record.id, "integrity check failed");
            return VerifyResult::failure(AshErrorCode::IntegrityFailed, "proof mismatch");
        }

        // Step 7: atomically consume. A successful crypto check that loses
        // a race to another concurrent verifier still yields exactly one
        // success overall.
        if !self.store.consume(context_id).await {
            return VerifyResult::failure(AshErrorCode::ReplayDetected, "context already consumed");
        }

        tracing::debug!(context_id = %record.id, "verification succeeded");
        VerifyResult::success(record.metadata)
    }
}
