//! Shared fixtures and fault-injecting collaborators for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prometheus::Registry;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use transactgrid_core::{Collaborators, CoreConfig, TransactionCore};
use transactgrid_storage::domain::{
    AggregationSpec, BucketTree, CacheStore, CounterStore, Currency, NewRecord, Record, RecordId,
    RecordStore, SearchIndex, SearchQuery,
};
use transactgrid_storage::infrastructure::{
    MemoryCacheStore, MemoryCounterStore, MemoryRecordStore, MemorySearchIndex,
};
use transactgrid_storage::{Result as StorageResult, StorageError};

/// Record store that can be switched to reject every write
#[derive(Default)]
pub struct FlakyRecordStore {
    inner: MemoryRecordStore,
    pub failing: AtomicBool,
}

#[async_trait]
impl RecordStore for FlakyRecordStore {
    async fn put(&self, record: &Record) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::database("write not acknowledged"));
        }
        self.inner.put(record).await
    }

    async fn get_one(&self, owner_key: &str, id: RecordId) -> StorageResult<Option<Record>> {
        self.inner.get_one(owner_key, id).await
    }

    async fn get_range(&self, owner_key: &str, limit: usize) -> StorageResult<Vec<Record>> {
        self.inner.get_range(owner_key, limit).await
    }

    async fn get_range_between(
        &self,
        owner_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> StorageResult<Vec<Record>> {
        self.inner.get_range_between(owner_key, from, to, limit).await
    }
}

/// Search index that counts calls and can be switched to reject writes
#[derive(Default)]
pub struct ObservedIndex {
    pub inner: MemorySearchIndex,
    pub rejecting: AtomicBool,
    pub index_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub aggregate_calls: AtomicUsize,
}

#[async_trait]
impl SearchIndex for ObservedIndex {
    async fn index(&self, document: &Record) -> StorageResult<()> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(StorageError::index("mapping conflict"));
        }
        self.inner.index(document).await
    }

    async fn count(&self) -> StorageResult<u64> {
        self.inner.count().await
    }

    async fn search(&self, query: &SearchQuery, size: usize) -> StorageResult<Vec<Record>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query, size).await
    }

    async fn aggregate(&self, spec: &[AggregationSpec]) -> StorageResult<BucketTree> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregate(spec).await
    }
}

/// Counter store whose every call fails
pub struct DownCounterStore;

#[async_trait]
impl CounterStore for DownCounterStore {
    async fn increment(&self, _key: &str) -> StorageResult<i64> {
        Err(StorageError::unavailable("counter store down"))
    }
    async fn get(&self, _key: &str) -> StorageResult<Option<i64>> {
        Err(StorageError::unavailable("counter store down"))
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> StorageResult<bool> {
        Err(StorageError::unavailable("counter store down"))
    }
    async fn ttl(&self, _key: &str) -> StorageResult<Option<Duration>> {
        Err(StorageError::unavailable("counter store down"))
    }
    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::unavailable("counter store down"))
    }
}

/// Cache store whose every call fails
pub struct DownCacheStore;

#[async_trait]
impl CacheStore for DownCacheStore {
    async fn get(&self, _key: &str) -> StorageResult<Option<Vec<u8>>> {
        Err(StorageError::unavailable("cache store down"))
    }
    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> StorageResult<()> {
        Err(StorageError::unavailable("cache store down"))
    }
    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::unavailable("cache store down"))
    }
    async fn keys_matching(&self, _prefix: &str) -> StorageResult<Vec<String>> {
        Err(StorageError::unavailable("cache store down"))
    }
}

pub struct Harness {
    pub core: TransactionCore,
    pub records: Arc<FlakyRecordStore>,
    pub index: Arc<ObservedIndex>,
    pub cache: Arc<MemoryCacheStore>,
    pub registry: Registry,
}

impl Harness {
    pub fn new(config: CoreConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(MemoryCounterStore::new()),
            Arc::new(MemoryCacheStore::new()),
        )
    }

    pub fn with_stores(
        config: CoreConfig,
        counters: Arc<dyn CounterStore>,
        cache: Arc<MemoryCacheStore>,
    ) -> Self {
        Self::build(config, counters, cache.clone(), cache)
    }

    pub fn with_cache_store(config: CoreConfig, cache_store: Arc<dyn CacheStore>) -> Self {
        Self::build(
            config,
            Arc::new(MemoryCounterStore::new()),
            cache_store,
            Arc::new(MemoryCacheStore::new()),
        )
    }

    fn build(
        config: CoreConfig,
        counters: Arc<dyn CounterStore>,
        cache_store: Arc<dyn CacheStore>,
        cache: Arc<MemoryCacheStore>,
    ) -> Self {
        let registry = Registry::new();
        let records = Arc::new(FlakyRecordStore::default());
        let index = Arc::new(ObservedIndex::default());
        let collaborators = Collaborators {
            records: records.clone(),
            index: index.clone(),
            counters,
            cache: cache_store,
        };
        let core = TransactionCore::new(config, collaborators, &registry).unwrap();
        Self {
            core,
            records,
            index,
            cache,
            registry,
        }
    }

    /// Value of a registered counter or gauge by name
    pub fn metric(&self, name: &str) -> f64 {
        self.registry
            .gather()
            .iter()
            .find(|family| family.get_name() == name)
            .and_then(|family| family.get_metric().first().cloned())
            .map(|m| {
                if m.has_counter() {
                    m.get_counter().get_value()
                } else {
                    m.get_gauge().get_value()
                }
            })
            .unwrap_or(0.0)
    }
}

/// Generous admission limits so tests that are not about rate limiting never trip it
pub fn relaxed_config() -> CoreConfig {
    CoreConfig::default()
        .admission(|a| a.requests_per_window(10_000))
        .propagation(|p| p.workers(2))
}

pub fn purchase(owner: &str, cents: i64, currency: Currency, note: &str, tags: &[&str]) -> NewRecord {
    NewRecord::new(owner, Decimal::new(cents, 2), currency)
        .with_note(note)
        .with_tags(tags.iter().copied())
}
