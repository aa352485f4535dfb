//! The core running against the SQLite record store

mod common;

use common::{purchase, relaxed_config};
use prometheus::Registry;
use std::sync::Arc;
use tempfile::TempDir;
use transactgrid_core::{Collaborators, TransactionCore};
use transactgrid_storage::domain::{Currency, RecordStore};
use transactgrid_storage::infrastructure::{
    MemoryCacheStore, MemoryCounterStore, MemorySearchIndex, SqliteRecordStore,
};

fn core_on(store: Arc<SqliteRecordStore>) -> TransactionCore {
    let collaborators = Collaborators {
        records: store,
        index: Arc::new(MemorySearchIndex::new()),
        counters: Arc::new(MemoryCounterStore::new()),
        cache: Arc::new(MemoryCacheStore::new()),
    };
    TransactionCore::new(relaxed_config(), collaborators, &Registry::new()).unwrap()
}

#[tokio::test]
async fn test_writes_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.db");

    let written = {
        let core = core_on(Arc::new(SqliteRecordStore::open(&path).unwrap()));
        let written = core
            .write(
                "alice",
                purchase("alice", 2599, Currency::Gbp, "Headphones", &["audio", "gift"]),
            )
            .await
            .unwrap();
        core.shutdown().await;
        written
    };

    let reopened = SqliteRecordStore::open(&path).unwrap();
    let records = reopened.get_range("alice", 10).await.unwrap();
    assert_eq!(records, vec![written]);
}

#[tokio::test]
async fn test_search_after_durable_write() {
    let core = core_on(Arc::new(SqliteRecordStore::open_in_memory().unwrap()));
    core.write("bob", purchase("bob", 1200, Currency::Eur, "Museum tickets", &["culture"]))
        .await
        .unwrap();
    core.orchestrator().flush().await;

    let hits = core.search("bob", "museum", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].owner_key, "bob");
}
