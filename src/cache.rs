//! TTL-bounded in-memory response cache

use crate::{clock::Clock, operation::CacheKey, types::MarketResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// A cached response and when it was stored
#[derive(Debug, Clone)]
struct CacheEntry {
    value: MarketResponse,
    stored_at: Instant,
}

/// In-memory store of prior responses
///
/// An entry is fresh while `now - stored_at < ttl`. Stale entries read as a
/// miss and stay in the map until overwritten or cleared; the key space is
/// bounded by the dashboard's handful of distinct requests.
pub struct CacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Creates an empty cache
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Gets a fresh value for `key`
    ///
    /// # Returns
    /// `None` when the key was never stored or its entry has expired
    pub async fn get(&self, key: &CacheKey) -> Option<MarketResponse> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;

        let age = self.clock.now().saturating_duration_since(entry.stored_at);
        if age < self.ttl {
            tracing::debug!(key = %key, age_ms = age.as_millis() as u64, "Cache hit");
            Some(entry.value.clone())
        } else {
            tracing::debug!(key = %key, "Cache entry expired");
            None
        }
    }

    /// Stores `value` under `key`, replacing any previous entry
    pub async fn set(&self, key: CacheKey, value: MarketResponse) {
        let stored_at = self.clock.now();
        let mut entries = self.entries.write().await;
        tracing::debug!(key = %key, fallback = value.is_fallback(), "Cached response");
        entries.insert(key, CacheEntry { value, stored_at });
    }

    /// Drops every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of entries held, fresh or stale
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
