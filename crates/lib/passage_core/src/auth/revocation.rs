//! Token revocation denylist keyed by `jti`.
//!
//! Entries expire on their own; long-running processes should call
//! [`InMemoryRevocationStore::purge_expired`] periodically to reclaim memory.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::users::StoreError;

/// Upper bound on a single entry's lifetime, to keep `Instant` arithmetic in range.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// TTL-backed set of revoked token ids.
///
/// `revoke` must be idempotent: inserting a live `jti` again is a no-op.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Deny `jti` for `ttl`.
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Whether `jti` has a live entry.
    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError>;
}

/// Process-local revocation store.
///
/// Expired entries are dropped lazily on lookup or by [`purge_expired`](Self::purge_expired).
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: DashMap<String, Instant>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all expired entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, expires_at| *expires_at >= now);
    }

    /// Number of entries, live or not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now() + ttl.min(MAX_TTL);
        self.entries
            .entry(jti.to_string())
            .and_modify(|existing| {
                if *existing < expires_at {
                    *existing = expires_at;
                }
            })
            .or_insert(expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        // Copy out before removing; holding the map guard across `remove_if` deadlocks.
        let live = self.entries.get(jti).map(|e| *e.value() >= now);
        match live {
            Some(true) => Ok(true),
            Some(false) => {
                self.entries.remove_if(jti, |_, expires_at| *expires_at < now);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
