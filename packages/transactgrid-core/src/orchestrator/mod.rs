//! Dual-write consistency orchestrator
//!
//! The durable record store is the source of truth: a write succeeds exactly
//! when the store acknowledges it. The search index is a derived copy fed by
//! the background [`Propagator`]; it may lag, and a record whose propagation
//! failed or was dropped stays missing from it until an external
//! reconciliation pass re-indexes it. Propagation outcomes are visible only
//! through `PropagationMetrics` and logs.
//!
//! Reads by owner go straight to the durable store. Search and summary reads
//! go through the [`ResultCache`] and then the index.

pub mod propagation;

pub use propagation::Propagator;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, Instrument};
use transactgrid_storage::domain::{
    Fuzziness, IndexField, NewRecord, Record, RecordId, RecordStore, SearchIndex, SearchQuery,
    SummaryRecord,
};
use transactgrid_storage::ErrorKind;

use crate::aggregation::{assemble, summary_spec};
use crate::cache::ResultCache;
use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::metrics::PropagationMetrics;
use crate::telemetry::operation_span;

/// Fields matched by free-text search
pub const SEARCH_FIELDS: [IndexField; 3] = [IndexField::Note, IndexField::Tags, IndexField::Currency];

pub struct ConsistencyOrchestrator {
    store: Arc<dyn RecordStore>,
    index: Arc<dyn SearchIndex>,
    cache: Arc<ResultCache>,
    propagator: Propagator,
    config: CoreConfig,
}

impl ConsistencyOrchestrator {
    /// Build the orchestrator and start its propagation workers
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        store: Arc<dyn RecordStore>,
        index: Arc<dyn SearchIndex>,
        cache: Arc<ResultCache>,
        config: CoreConfig,
        metrics: PropagationMetrics,
    ) -> Self {
        let propagator = Propagator::start(
            index.clone(),
            Some(cache.clone()),
            config.propagation.clone(),
            metrics,
        );
        Self {
            store,
            index,
            cache,
            propagator,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Write path
    // ═══════════════════════════════════════════════════════════════════════

    /// Persist a record durably and queue it for indexing
    ///
    /// Assigns an id and timestamp when absent. Returns once the durable store
    /// has acknowledged; indexing happens in the background.
    ///
    /// # Errors
    ///
    /// - `CoreError::Validation` if the record breaks the configured limits
    /// - `CoreError::Storage` if the durable write failed; nothing was queued
    pub async fn write(&self, input: NewRecord) -> Result<Record> {
        input.validate(&self.config.records).map_err(|e| match e.kind {
            ErrorKind::Validation => CoreError::Validation(e.message),
            _ => CoreError::Storage(e),
        })?;
        let record = input.into_record();
        let span = operation_span("write", &record.owner_key);

        async {
            self.store.put(&record).await?;
            info!("Record {} stored", record.id);

            self.propagator.submit(record.clone()).await;
            Ok::<_, CoreError>(record)
        }
        .instrument(span)
        .await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Durable reads
    // ═══════════════════════════════════════════════════════════════════════

    /// Most recent records of one owner, read from the durable store
    pub async fn read(&self, owner_key: &str, limit: Option<usize>) -> Result<Vec<Record>> {
        let limit = self.config.search.clamp_size(limit);
        let records = self.store.get_range(owner_key, limit).await?;
        debug!("Found {} records for owner {}", records.len(), owner_key);
        Ok(records)
    }

    /// Records of one owner with `from <= created_at <= to`, most recent first
    pub async fn read_between(
        &self,
        owner_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        if from > to {
            return Err(CoreError::validation(format!(
                "Range start {} is after range end {}",
                from, to
            )));
        }
        let limit = self.config.search.clamp_size(limit);
        Ok(self
            .store
            .get_range_between(owner_key, from, to, limit)
            .await?)
    }

    pub async fn get(&self, owner_key: &str, id: RecordId) -> Result<Option<Record>> {
        Ok(self.store.get_one(owner_key, id).await?)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Index reads (cached)
    // ═══════════════════════════════════════════════════════════════════════

    /// Fuzzy free-text search over note, tags and currency
    pub async fn search(&self, text: &str, size: Option<usize>) -> Result<Vec<Record>> {
        if text.trim().is_empty() {
            return Err(CoreError::validation("Search query must not be blank"));
        }
        let size = self.config.search.clamp_size(size);
        let key = self.cache.search_key(text, size);

        if let Some(hits) = self.cache.get::<Vec<Record>>(&key).await {
            debug!("Returning cached search results for '{}'", text);
            return Ok(hits);
        }
        if self.index_is_empty().await? {
            return Ok(Vec::new());
        }

        let query = SearchQuery::multi_match(text, SEARCH_FIELDS, Fuzziness::Auto);
        let hits = self
            .index
            .search(&query, size)
            .await
            .map_err(CoreError::index)?;

        if !hits.is_empty() {
            self.cache.put(&key, &hits).await;
        }
        info!("Search for '{}' found {} records", text, hits.len());
        Ok(hits)
    }

    /// Indexed records of one owner, cached in the owner's scope
    pub async fn search_by_owner(&self, owner_key: &str, size: Option<usize>) -> Result<Vec<Record>> {
        let size = self.config.search.clamp_size(size);
        let key = self.cache.owner_key(owner_key, &format!("search {}", size));

        if let Some(hits) = self.cache.get::<Vec<Record>>(&key).await {
            return Ok(hits);
        }
        if self.index_is_empty().await? {
            return Ok(Vec::new());
        }

        let query = SearchQuery::term(IndexField::OwnerKey, owner_key);
        let hits = self
            .index
            .search(&query, size)
            .await
            .map_err(CoreError::index)?;

        if !hits.is_empty() {
            self.cache.put(&key, &hits).await;
        }
        Ok(hits)
    }

    /// Per-owner summaries over the whole index
    ///
    /// # Errors
    ///
    /// `CoreError::AggregationShape` if the index answered with a tree the
    /// assembler does not recognize; no partial result is returned.
    pub async fn summarize(&self) -> Result<Vec<SummaryRecord>> {
        let key = self.cache.summary_key();
        if let Some(summaries) = self.cache.get::<Vec<SummaryRecord>>(&key).await {
            debug!("Returning cached summary");
            return Ok(summaries);
        }
        if self.index_is_empty().await? {
            return Ok(Vec::new());
        }

        let spec = summary_spec(self.config.search.top_tags);
        let tree = self.index.aggregate(&spec).await.map_err(CoreError::index)?;
        let summaries = assemble(&tree)?;

        if !summaries.is_empty() {
            self.cache.put(&key, &summaries).await;
        }
        info!("Summary computed for {} owners", summaries.len());
        Ok(summaries)
    }

    /// Empty results are not cached, so a later write shows up on the next read
    async fn index_is_empty(&self) -> Result<bool> {
        let count = self.index.count().await.map_err(CoreError::index)?;
        if count == 0 {
            info!("Index holds no records, returning empty result");
        }
        Ok(count == 0)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Administration
    // ═══════════════════════════════════════════════════════════════════════

    /// Drop every cached search, summary and owner entry
    pub async fn clear_cache(&self) -> usize {
        let removed = self.cache.clear_all().await;
        info!("Cleared {} cache entries", removed);
        removed
    }

    /// Wait for queued index writes to be attempted
    pub async fn flush(&self) {
        self.propagator.flush().await
    }

    /// Drain pending index writes and stop the workers
    pub async fn shutdown(&self) {
        self.propagator.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use prometheus::Registry;
    use rust_decimal::Decimal;
    use transactgrid_storage::domain::Currency;
    use transactgrid_storage::infrastructure::{
        MemoryCacheStore, MemoryRecordStore, MemorySearchIndex,
    };

    use crate::metrics::CoreMetrics;

    struct Fixture {
        orchestrator: ConsistencyOrchestrator,
        index: Arc<MemorySearchIndex>,
        metrics: CoreMetrics,
    }

    fn fixture() -> Fixture {
        let metrics = CoreMetrics::new(&Registry::new()).unwrap();
        let index = Arc::new(MemorySearchIndex::new());
        let config = CoreConfig::default().propagation(|p| p.workers(2));
        let cache = Arc::new(ResultCache::new(
            Arc::new(MemoryCacheStore::new()),
            config.cache.clone(),
            metrics.cache.clone(),
        ));
        let orchestrator = ConsistencyOrchestrator::new(
            Arc::new(MemoryRecordStore::new()),
            index.clone(),
            cache,
            config,
            metrics.propagation.clone(),
        );
        Fixture {
            orchestrator,
            index,
            metrics,
        }
    }

    fn coffee(owner: &str, cents: i64) -> NewRecord {
        NewRecord::new(owner, Decimal::new(cents, 2), Currency::Usd)
            .with_note("Coffee beans")
            .with_tags(["food"])
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let fx = fixture();
        let written = fx.orchestrator.write(coffee("alice", 450)).await.unwrap();

        let records = fx.orchestrator.read("alice", None).await.unwrap();
        assert_eq!(records, vec![written.clone()]);

        let fetched = fx.orchestrator.get("alice", written.id).await.unwrap();
        assert_eq!(fetched, Some(written.clone()));
        assert_eq!(fx.orchestrator.get("bob", written.id).await.unwrap(), None);

        fx.orchestrator.flush().await;
        assert!(fx.index.contains(&written.id));
        assert_eq!(fx.metrics.propagation.succeeded.get(), 1);
    }

    #[tokio::test]
    async fn test_invalid_record_rejected_before_storage() {
        let fx = fixture();
        let err = fx
            .orchestrator
            .write(NewRecord::new("alice", Decimal::ZERO, Currency::Eur))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Validation(_)));
        assert!(fx.orchestrator.read("alice", None).await.unwrap().is_empty());
        assert_eq!(fx.metrics.propagation.enqueued.get(), 0);
    }

    #[tokio::test]
    async fn test_read_between_rejects_inverted_range() {
        let fx = fixture();
        let now = Utc::now();
        let err = fx
            .orchestrator
            .read_between("alice", now, now - ChronoDuration::hours(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_read_between_filters_by_time() {
        let fx = fixture();
        let now = Utc::now();
        for hours in [1, 5, 10] {
            fx.orchestrator
                .write(coffee("alice", 100).with_created_at(now - ChronoDuration::hours(hours)))
                .await
                .unwrap();
        }

        let records = fx
            .orchestrator
            .read_between("alice", now - ChronoDuration::hours(6), now, None)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].created_at > records[1].created_at);
    }

    #[tokio::test]
    async fn test_blank_search_rejected() {
        let fx = fixture();
        let err = fx.orchestrator.search("   ", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_search_empty_index_not_cached() {
        let fx = fixture();
        assert!(fx.orchestrator.search("coffee", None).await.unwrap().is_empty());
        assert_eq!(fx.metrics.cache.writes.get(), 0);

        fx.orchestrator.write(coffee("alice", 450)).await.unwrap();
        fx.orchestrator.flush().await;

        let hits = fx.orchestrator.search("coffee", None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_search_served_from_cache() {
        let fx = fixture();
        fx.orchestrator.write(coffee("alice", 450)).await.unwrap();
        fx.orchestrator.flush().await;

        let first = fx.orchestrator.search("Coffee", Some(10)).await.unwrap();
        let second = fx.orchestrator.search("  coffee ", Some(10)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.metrics.cache.hits.get(), 1);
        assert_eq!(fx.metrics.cache.writes.get(), 1);
    }

    #[tokio::test]
    async fn test_owner_search_invalidated_after_propagation() {
        let fx = fixture();
        fx.orchestrator.write(coffee("alice", 450)).await.unwrap();
        fx.orchestrator.flush().await;
        assert_eq!(fx.orchestrator.search_by_owner("alice", None).await.unwrap().len(), 1);

        fx.orchestrator.write(coffee("alice", 900)).await.unwrap();
        fx.orchestrator.flush().await;

        let hits = fx.orchestrator.search_by_owner("alice", None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].amount, Decimal::new(900, 2));
    }

    #[tokio::test]
    async fn test_summarize_after_flush() {
        let fx = fixture();
        fx.orchestrator.write(coffee("alice", 450)).await.unwrap();
        fx.orchestrator.write(coffee("alice", 550)).await.unwrap();
        fx.orchestrator
            .write(NewRecord::new("bob", Decimal::new(2000, 2), Currency::Eur).with_tags(["rent"]))
            .await
            .unwrap();
        fx.orchestrator.flush().await;

        let summaries = fx.orchestrator.summarize().await.unwrap();
        assert_eq!(summaries.len(), 2);

        let alice = summaries.iter().find(|s| s.owner_key == "alice").unwrap();
        assert_eq!(alice.total_transactions, 2);
        assert_eq!(alice.total_amount, Some(Decimal::new(1000, 2)));
        assert_eq!(alice.most_used_currency.as_deref(), Some("USD"));
        assert_eq!(alice.tag_count("food"), Some(2));

        assert_eq!(fx.orchestrator.clear_cache().await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_writes() {
        let fx = fixture();
        let written = fx.orchestrator.write(coffee("alice", 450)).await.unwrap();
        fx.orchestrator.shutdown().await;
        assert!(fx.index.contains(&written.id));
    }
}
