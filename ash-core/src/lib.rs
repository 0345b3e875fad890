//! # ash-core
//!
//! Core protocol engine for ASH (Anti-tamper Security Hash): a stateless
//! request-integrity and anti-replay protocol layered on top of ordinary
//! request/response transports.
//!
//! This crate provides canonicalization, binding normalization, proof
//! construction/verification (both the v1 hash-only and v2.1 HMAC/derived-
//! secret variants), the context lifecycle and its `ContextStore` contract,
//! and the `Ash` engine that orchestrates issuance and verification.

pub mod binding;
pub mod canonicalize;
pub mod clock;
pub mod compare;
pub mod engine;
pub mod error;
mod hex;
pub mod proof;
pub mod store;
pub mod types;
pub mod wire;

pub use binding::normalize_binding;
pub use canonicalize::{canonicalize, canonicalize_json, canonicalize_urlencoded, parse_json, Value};
pub use clock::{Clock, SystemClock};
pub use compare::{constant_time_eq, constant_time_str_eq};
pub use engine::{Ash, Variant};
pub use error::{AshError, AshErrorCode, AshResult};
pub use proof::{
    base64url_decode, base64url_encode, body_hash, build_proof_v1, build_proof_v2_1,
    derive_client_secret,
};
pub use store::{new_v1_store, new_v2_1_store, ContextStore, InMemoryContextStore, NoncePolicy};
pub use types::{ContentType, ContextPublicInfo, Metadata, Mode, StoredContext, VerifyResult};
pub use wire::{ClientMessage, IssueContextRequest, ProtectedRequest, ServerMessage};

/// Protocol version string for the v1 wire construction (spec §6).
pub const ASH_V1_VERSION: &str = "ASHv1";
/// Protocol version string for the v2.1 wire construction. The prefix is
/// not interpolated into the v2.1 proof itself — the variant is selected
/// per endpoint/engine, not negotiated in-band (spec §9 Open Question b).
pub const ASH_V2_1_VERSION: &str = "ASHv2.1";
