//! Context store contract and in-memory reference implementation
//! (spec §4.4).
//!
//! Expressed as an `async_trait` so a remote backend (Redis, etc.) can do
//! I/O in any of these calls without changing the trait shape; the
//! in-memory implementation's methods never actually suspend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::{AshError, AshErrorCode, AshResult};
use crate::types::{Metadata, Mode, StoredContext};

/// Capability set the engine depends on. A pluggable implementation MUST
/// implement `consume` as a single atomic conditional update — the only
/// mechanism preventing replay.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn create(
        &self,
        binding: &str,
        ttl_ms: i64,
        mode: Mode,
        metadata: Metadata,
    ) -> AshResult<StoredContext>;

    /// Pure lookup. MUST return `None` (and MAY delete) if expired.
    async fn get(&self, id: &str) -> Option<StoredContext>;

    /// Atomically transition `used: false -> true`, returning `true` iff
    /// this call made the transition.
    async fn consume(&self, id: &str) -> bool;

    async fn size(&self) -> usize;

    async fn clear(&self);
}

fn generate_id(prefix: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{prefix}{}", crate::hex::encode(bytes))
}

fn generate_nonce(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    crate::hex::encode(bytes)
}

/// When a nonce is generated for a newly created context (spec §3: "nonce
/// present iff mode == STRICT (v1) or always for v2.1").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoncePolicy {
    /// Only `Mode::Strict` contexts get a nonce (v1).
    StrictOnly,
    /// Every context gets a nonce regardless of `mode` (v2.1).
    Always,
}

/// In-memory `ContextStore`: a `HashMap` guarded by a single mutex. `create`
/// holds the lock across id generation and insertion; `consume` holds it
/// across the read-modify-write of `used`, giving linearizable
/// single-winner semantics for any number of concurrent callers racing the
/// same id.
pub struct InMemoryContextStore {
    id_prefix: &'static str,
    nonce_len: usize,
    nonce_policy: NoncePolicy,
    clock: Arc<dyn Clock>,
    inner: Mutex<HashMap<String, StoredContext>>,
}

impl InMemoryContextStore {
    /// `id_prefix` is `"ctx_"` for v1, `"ash_"` for v2.1. `nonce_len` is the
    /// nonce byte length (16 for v1 strict mode, 32 for v2.1). `nonce_policy`
    /// decides whether `mode` gates nonce generation or every context gets
    /// one unconditionally.
    pub fn new(
        id_prefix: &'static str,
        nonce_len: usize,
        nonce_policy: NoncePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id_prefix,
            nonce_len,
            nonce_policy,
            clock,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Remove expired entries. Safe to call concurrently with any other
    /// store operation; does not affect the semantics of in-flight verifies
    /// since `get`/`consume` already treat expired entries as absent.
    pub async fn sweep_expired(&self) {
        let now = self.clock.now_ms();
        let mut guard = self.inner.lock().await;
        guard.retain(|_, ctx| ctx.expires_at_ms > now);
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn create(
        &self,
        binding: &str,
        ttl_ms: i64,
        mode: Mode,
        metadata: Metadata,
    ) -> AshResult<StoredContext> {
        if ttl_ms <= 0 {
            return Err(AshError::new(
                AshErrorCode::InvalidContext,
                "ttl_ms must be positive",
            ));
        }

        let nonce = match (self.nonce_policy, mode) {
            (NoncePolicy::Always, _) | (NoncePolicy::StrictOnly, Mode::Strict) => {
                Some(generate_nonce(self.nonce_len))
            }
            (NoncePolicy::StrictOnly, Mode::Balanced) => None,
        };

        let now = self.clock.now_ms();
        let mut guard = self.inner.lock().await;

        let id = loop {
            let candidate = generate_id(self.id_prefix);
            if !guard.contains_key(&candidate) {
                break candidate;
            }
        };

        let context = StoredContext {
            id: id.clone(),
            binding: binding.to_string(),
            mode,
            expires_at_ms: now + ttl_ms,
            used: false,
            nonce,
            metadata,
        };

        guard.insert(id, context.clone());
        Ok(context)
    }

    async fn get(&self, id: &str) -> Option<StoredContext> {
        let now = self.clock.now_ms();
        let mut guard = self.inner.lock().await;
        match guard.get(id) {
            Some(ctx) if ctx.expires_at_ms > now => Some(ctx.clone()),
            Some(_) => {
                guard.remove(id);
                None
            }
            None => None,
        }
    }

    async fn consume(&self, id: &str) -> bool {
        let now = self.clock.now_ms();
        let mut guard = self.inner.lock().await;
        match guard.get_mut(id) {
            Some(ctx) if ctx.expires_at_ms > now && !ctx.used => {
                ctx.used = true;
                true
            }
            _ => false,
        }
    }

    async fn size(&self) -> usize {
        self.inner.lock().await.len()
    }

    async fn clear(&self) {
        self.inner.lock().await.clear();
    }
}

/// A `ContextStore` that always creates v2.1-style contexts: a nonce is
/// always generated (mode becomes an orthogonal label only), id prefix is
/// `"ash_"`, nonce length 32 bytes.
pub fn new_v2_1_store(clock: Arc<dyn Clock>) -> InMemoryContextStore {
    InMemoryContextStore::new("ash_", 32, NoncePolicy::Always, clock)
}

/// A `ContextStore` for v1: `"ctx_"` id prefix, 16-byte nonce, nonce only
/// generated in strict mode.
pub fn new_v1_store(clock: Arc<dyn Clock>) -> InMemoryContextStore {
    InMemoryContextStore::new("ctx_", 16, NoncePolicy::StrictOnly, clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::collections::BTreeMap;

    fn store() -> InMemoryContextStore {
        InMemoryContextStore::new(
            "ctx_",
            16,
            NoncePolicy::StrictOnly,
            Arc::new(ManualClock::new(1_000)),
        )
    }

    #[tokio::test]
    async fn create_assigns_prefixed_id() {
        let store = store();
        let ctx = store
            .create("POST /api/update", 30_000, Mode::Balanced, BTreeMap::new())
            .await
            .unwrap();
        assert!(ctx.id.starts_with("ctx_"));
        assert_eq!(ctx.binding, "POST /api/update");
        assert!(!ctx.used);
        assert!(ctx.nonce.is_none());
    }

    #[tokio::test]
    async fn strict_mode_generates_nonce() {
        let store = store();
        let ctx = store
            .create("POST /api/update", 30_000, Mode::Strict, BTreeMap::new())
            .await
            .unwrap();
        assert!(ctx.nonce.is_some());
    }

    #[tokio::test]
    async fn v2_1_store_generates_nonce_regardless_of_mode() {
        let store = new_v2_1_store(Arc::new(ManualClock::new(1_000)));
        let ctx = store
            .create("POST /api/update", 30_000, Mode::Balanced, BTreeMap::new())
            .await
            .unwrap();
        assert!(ctx.nonce.is_some());
        assert!(ctx.id.starts_with("ash_"));
    }

    #[tokio::test]
    async fn get_returns_none_for_missing() {
        let store = store();
        assert!(store.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn consume_single_use() {
        let store = store();
        let ctx = store
            .create("POST /api/update", 30_000, Mode::Balanced, BTreeMap::new())
            .await
            .unwrap();

        assert!(store.consume(&ctx.id).await);
        assert!(!store.consume(&ctx.id).await);
    }

    #[tokio::test]
    async fn consume_nonexistent_returns_false() {
        let store = store();
        assert!(!store.consume("nonexistent").await);
    }

    #[tokio::test]
    async fn expired_context_is_invisible_to_get_and_consume() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = InMemoryContextStore::new("ctx_", 16, NoncePolicy::StrictOnly, clock.clone());
        let ctx = store
            .create("POST /api/update", 1_000, Mode::Balanced, BTreeMap::new())
            .await
            .unwrap();

        clock.advance(1_001);

        assert!(store.get(&ctx.id).await.is_none());
        assert!(!store.consume(&ctx.id).await);
    }

    #[tokio::test]
    async fn size_and_clear() {
        let store = store();
        assert_eq!(store.size().await, 0);
        store
            .create("POST /a", 1000, Mode::Balanced, BTreeMap::new())
            .await
            .unwrap();
        store
            .create("POST /b", 1000, Mode::Balanced, BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(store.size().await, 2);
        store.clear().await;
        assert_eq!(store.size().await, 0);
    }

    #[tokio::test]
    async fn sweep_removes_expired_only() {
        let clock = Arc::new(ManualClock::new(0));
        let store = InMemoryContextStore::new("ctx_", 16, NoncePolicy::StrictOnly, clock.clone());
        let short_lived = store
            .create("POST /a", 100, Mode::Balanced, BTreeMap::new())
            .await
            .unwrap();
        let long_lived = store
            .create("POST /b", 10_000, Mode::Balanced, BTreeMap::new())
            .await
            .unwrap();

        clock.advance(200);
        store.sweep_expired().await;

        assert_eq!(store.size().await, 1);
        assert!(store.get(&long_lived.id).await.is_some());
        assert!(store.get(&short_lived.id).await.is_none());
    }

    #[tokio::test]
    async fn metadata_round_trips_and_never_enters_proof() {
        let store = store();
        let mut metadata = BTreeMap::new();
        metadata.insert("user_id".to_string(), serde_json::json!(123));
        let ctx = store
            .create("POST /api/update", 30_000, Mode::Balanced, metadata.clone())
            .await
            .unwrap();
        assert_eq!(ctx.metadata, metadata);
    }

    #[tokio::test]
    async fn single_use_under_concurrency() {
        let store = Arc::new(store());
        let ctx = store
            .create("POST /api/update", 30_000, Mode::Balanced, BTreeMap::new())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            let id = ctx.id.clone();
            handles.push(tokio::spawn(async move { store.consume(&id).await }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
