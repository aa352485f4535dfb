//! Cache-aside wrapper over the shared cache store
//!
//! Every failure here is soft. Store errors and undecodable payloads count
//! as misses; values that cannot be encoded, or writes the store rejects,
//! are skipped. The caller always already holds the fresh value.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use transactgrid_storage::domain::CacheStore;

use super::key::{CacheKey, OWNER_PREFIX, SEARCH_PREFIX, SUMMARY_PREFIX};
use crate::config::CacheConfig;
use crate::metrics::CacheMetrics;

pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    metrics: CacheMetrics,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig, metrics: CacheMetrics) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn search_key(&self, query: &str, size: usize) -> CacheKey {
        CacheKey::search(query, size, self.config.max_key_length)
    }

    pub fn summary_key(&self) -> CacheKey {
        CacheKey::summary()
    }

    pub fn owner_key(&self, owner_key: &str, raw: &str) -> CacheKey {
        CacheKey::owner(owner_key, raw, self.config.max_key_length)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = match self.store.get(key.as_str()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.metrics.misses.inc();
                return None;
            }
            Err(e) => {
                self.metrics.failures.inc();
                self.metrics.misses.inc();
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                self.metrics.hits.inc();
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                self.metrics.failures.inc();
                self.metrics.misses.inc();
                warn!(key = %key, error = %e, "Cached payload undecodable, treating as miss");
                None
            }
        }
    }

    /// Store `value` with the configured TTL
    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T) {
        self.put_with_ttl(key, value, self.config.ttl()).await
    }

    pub async fn put_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.failures.inc();
                warn!(key = %key, error = %e, "Failed to encode cache payload, skipping write");
                return;
            }
        };

        match self.store.set(key.as_str(), bytes, ttl).await {
            Ok(()) => self.metrics.writes.inc(),
            Err(e) => {
                self.metrics.failures.inc();
                warn!(key = %key, error = %e, "Cache write failed");
            }
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        if let Err(e) = self.store.delete(key.as_str()).await {
            self.metrics.failures.inc();
            warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }

    /// Remove every entry in the owner's scope; returns the number removed
    pub async fn invalidate_all(&self, owner_key: &str) -> usize {
        let scope = CacheKey::owner_scope(owner_key);
        self.purge_prefix(&scope).await
    }

    /// Remove every entry this cache wrote, in all namespaces
    pub async fn clear_all(&self) -> usize {
        let mut removed = 0;
        for prefix in [SEARCH_PREFIX, SUMMARY_PREFIX, OWNER_PREFIX] {
            removed += self.purge_prefix(prefix).await;
        }
        removed
    }

    async fn purge_prefix(&self, prefix: &str) -> usize {
        let keys = match self.store.keys_matching(prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                self.metrics.failures.inc();
                warn!(prefix, error = %e, "Failed to list cache keys");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            match self.store.delete(&key).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    self.metrics.failures.inc();
                    warn!(key = %key, error = %e, "Failed to delete cache key");
                }
            }
        }
        debug!(prefix, removed, "Purged cache keys");
        removed
    }
}
