//! Port traits for the external collaborators
//!
//! # Implementations
//!
//! - `MemoryRecordStore`, `MemorySearchIndex`, `MemoryCounterStore`,
//!   `MemoryCacheStore`: in-process adapters
//! - `SqliteRecordStore` (feature `sqlite`): durable record store
//!
//! # Examples
//!
//! ```rust,ignore
//! use transactgrid_storage::domain::{NewRecord, RecordStore, Currency};
//!
//! async fn example(store: impl RecordStore) -> Result<()> {
//!     let record = NewRecord::new("alice", dec!(12.50), Currency::Usd).into_record();
//!     store.put(&record).await?;
//!
//!     let latest = store.get_range("alice", 10).await?;
//!     assert_eq!(latest[0].id, record.id);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use super::aggregation::{AggregationSpec, BucketTree};
use super::query::SearchQuery;
use super::record::{Record, RecordId};
use crate::Result;

// ═══════════════════════════════════════════════════════════════════════════
// Durable record store
// ═══════════════════════════════════════════════════════════════════════════

/// Authoritative record storage, partitioned by owner key
///
/// Writes for one owner are linearized by the store itself.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record
    ///
    /// Records are immutable once stored and identified by `(owner_key, id)`.
    /// Putting an identical record again is a no-op; the same id under another
    /// owner is a different record.
    ///
    /// # Errors
    ///
    /// - `Conflict` if `(owner_key, id)` is stored with different content
    /// - any other `StorageError` if the write was not acknowledged. No
    ///   partial write is visible after an error.
    async fn put(&self, record: &Record) -> Result<()>;

    /// Point lookup within an owner's partition
    async fn get_one(&self, owner_key: &str, id: RecordId) -> Result<Option<Record>>;

    /// Most-recent-first records of one owner
    async fn get_range(&self, owner_key: &str, limit: usize) -> Result<Vec<Record>>;

    /// Most-recent-first records with `from <= created_at <= to`
    async fn get_range_between(
        &self,
        owner_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Record>>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Search index
// ═══════════════════════════════════════════════════════════════════════════

/// Read-optimized, eventually consistent copy of the records
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index (or re-index) a document keyed by its record id
    async fn index(&self, document: &Record) -> Result<()>;

    /// Total number of indexed documents
    async fn count(&self) -> Result<u64>;

    /// Matching documents ordered by timestamp, newest first
    async fn search(&self, query: &SearchQuery, size: usize) -> Result<Vec<Record>>;

    /// Run a bucketed aggregation over every document
    async fn aggregate(&self, spec: &[AggregationSpec]) -> Result<BucketTree>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Shared fast stores
// ═══════════════════════════════════════════════════════════════════════════

/// Atomic counters with expiry
///
/// All atomicity lives in the store; callers never lock around it.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically add one and return the new value (creates the key at 1)
    async fn increment(&self, key: &str) -> Result<i64>;

    async fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Set the key's time to live; `false` when the key does not exist
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining time to live; `None` for missing keys or keys without expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Byte-valued key/value store with per-entry TTL
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Live keys starting with `prefix`
    async fn keys_matching(&self, prefix: &str) -> Result<Vec<String>>;
}
