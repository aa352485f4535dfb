//! Request-level entry points: admission first, then the orchestrator
//!
//! ```text
//! write:     AdmissionGate::check -> ConsistencyOrchestrator::write
//! read:      AdmissionGate::check -> ResultCache -> index -> assemble -> ResultCache
//! ```

use chrono::{DateTime, Utc};
use prometheus::Registry;
use std::sync::Arc;
use tracing::info;
use transactgrid_storage::domain::{
    CacheStore, CounterStore, NewRecord, Record, RecordId, RecordStore, SearchIndex,
    SummaryRecord,
};

use crate::admission::AdmissionGate;
use crate::cache::ResultCache;
use crate::config::CoreConfig;
use crate::error::Result;
use crate::metrics::CoreMetrics;
use crate::orchestrator::ConsistencyOrchestrator;

/// External collaborators the core is wired against
#[derive(Clone)]
pub struct Collaborators {
    pub records: Arc<dyn RecordStore>,
    pub index: Arc<dyn SearchIndex>,
    pub counters: Arc<dyn CounterStore>,
    pub cache: Arc<dyn CacheStore>,
}

pub struct TransactionCore {
    gate: AdmissionGate,
    orchestrator: ConsistencyOrchestrator,
    metrics: CoreMetrics,
}

impl TransactionCore {
    /// Validate `config`, register metrics on `registry` and start the
    /// propagation workers
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: CoreConfig, collaborators: Collaborators, registry: &Registry) -> Result<Self> {
        config.validate()?;
        let metrics = CoreMetrics::new(registry)?;

        let gate = AdmissionGate::new(
            collaborators.counters,
            config.admission.clone(),
            metrics.admission.clone(),
        );
        let cache = Arc::new(ResultCache::new(
            collaborators.cache,
            config.cache.clone(),
            metrics.cache.clone(),
        ));
        let orchestrator = ConsistencyOrchestrator::new(
            collaborators.records,
            collaborators.index,
            cache,
            config,
            metrics.propagation.clone(),
        );

        info!("Transaction core ready");
        Ok(Self {
            gate,
            orchestrator,
            metrics,
        })
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn orchestrator(&self) -> &ConsistencyOrchestrator {
        &self.orchestrator
    }

    pub fn metrics(&self) -> &CoreMetrics {
        &self.metrics
    }

    pub async fn write(&self, caller: &str, input: NewRecord) -> Result<Record> {
        self.gate.check(caller).await?;
        self.orchestrator.write(input).await
    }

    pub async fn read(&self, caller: &str, owner_key: &str, limit: Option<usize>) -> Result<Vec<Record>> {
        self.gate.check(caller).await?;
        self.orchestrator.read(owner_key, limit).await
    }

    pub async fn read_between(
        &self,
        caller: &str,
        owner_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        self.gate.check(caller).await?;
        self.orchestrator.read_between(owner_key, from, to, limit).await
    }

    pub async fn get(&self, caller: &str, owner_key: &str, id: RecordId) -> Result<Option<Record>> {
        self.gate.check(caller).await?;
        self.orchestrator.get(owner_key, id).await
    }

    pub async fn search(&self, caller: &str, text: &str, size: Option<usize>) -> Result<Vec<Record>> {
        self.gate.check(caller).await?;
        self.orchestrator.search(text, size).await
    }

    pub async fn search_by_owner(
        &self,
        caller: &str,
        owner_key: &str,
        size: Option<usize>,
    ) -> Result<Vec<Record>> {
        self.gate.check(caller).await?;
        self.orchestrator.search_by_owner(owner_key, size).await
    }

    pub async fn summarize(&self, caller: &str) -> Result<Vec<SummaryRecord>> {
        self.gate.check(caller).await?;
        self.orchestrator.summarize().await
    }

    /// Admin purge; not rate limited
    pub async fn clear_cache(&self) -> usize {
        self.orchestrator.clear_cache().await
    }

    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await
    }
}
