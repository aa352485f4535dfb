//! In-memory counter store
//!
//! Expiry uses `tokio::time::Instant`, so paused-clock tests can advance
//! through a window deterministically.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::CounterStore;
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
struct CounterEntry {
    value: i64,
    expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Sharded counter map; each operation holds one shard lock for its duration
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, CounterEntry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<i64> {
        let now = Instant::now();
        let mut entry = self.counters.entry(key.to_string()).or_default();
        if entry.is_expired(now) {
            *entry = CounterEntry::default();
        }
        entry.value += 1;
        Ok(entry.value)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let now = Instant::now();
        match self.counters.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value)),
            Some(_) => {}
            None => return Ok(None),
        }
        self.counters.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.counters.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        Ok(self.counters.get(key).and_then(|entry| {
            if entry.is_expired(now) {
                return None;
            }
            entry.expires_at.map(|at| at.saturating_duration_since(now))
        }))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.counters.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_increment_and_expire() {
        let store = MemoryCounterStore::new();

        assert_eq!(store.increment("k").await.unwrap(), 1);
        assert_eq!(store.increment("k").await.unwrap(), 2);
        assert_eq!(store.ttl("k").await.unwrap(), None);

        assert!(store.expire("k", Duration::from_secs(60)).await.unwrap());
        assert_eq!(store.ttl("k").await.unwrap(), Some(Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.increment("k").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let store = MemoryCounterStore::new();
        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryCounterStore::new();
        store.increment("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_atomic() {
        let store = std::sync::Arc::new(MemoryCounterStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..25 {
                    store.increment("k").await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.get("k").await.unwrap(), Some(200));
    }
}
