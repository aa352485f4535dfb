//! In-memory durable-store stand-in

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use crate::domain::{Record, RecordId, RecordStore};
use crate::{Result, StorageError};

/// Owner-partitioned record map
///
/// Each partition is keyed by record id; reads sort most-recent-first.
#[derive(Default)]
pub struct MemoryRecordStore {
    partitions: RwLock<HashMap<String, BTreeMap<RecordId, Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across partitions
    pub fn len(&self) -> usize {
        self.partitions.read().values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_newest_first<F>(&self, owner_key: &str, limit: usize, keep: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        let partitions = self.partitions.read();
        let mut records: Vec<Record> = partitions
            .get(owner_key)
            .map(|p| p.values().filter(|r| keep(r)).cloned().collect())
            .unwrap_or_default();
        records.sort_by(Record::newest_first);
        records.truncate(limit);
        records
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record: &Record) -> Result<()> {
        let mut partitions = self.partitions.write();
        let partition = partitions.entry(record.owner_key.clone()).or_default();
        match partition.entry(record.id) {
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
            Entry::Occupied(existing) if existing.get() == record => Ok(()),
            Entry::Occupied(_) => Err(StorageError::conflict(&record.owner_key, record.id)),
        }
    }

    async fn get_one(&self, owner_key: &str, id: RecordId) -> Result<Option<Record>> {
        Ok(self
            .partitions
            .read()
            .get(owner_key)
            .and_then(|p| p.get(&id))
            .cloned())
    }

    async fn get_range(&self, owner_key: &str, limit: usize) -> Result<Vec<Record>> {
        Ok(self.collect_newest_first(owner_key, limit, |_| true))
    }

    async fn get_range_between(
        &self,
        owner_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        Ok(self.collect_newest_first(owner_key, limit, |r| {
            r.created_at >= from && r.created_at <= to
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, NewRecord};
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn record_at(owner: &str, minutes_ago: i64) -> Record {
        NewRecord::new(owner, Decimal::new(1000, 2), Currency::Eur)
            .with_created_at(Utc::now() - Duration::minutes(minutes_ago))
            .into_record()
    }

    #[tokio::test]
    async fn test_put_and_get_one() {
        let store = MemoryRecordStore::new();
        let record = record_at("alice", 0);

        store.put(&record).await.unwrap();

        let found = store.get_one("alice", record.id).await.unwrap();
        assert_eq!(found, Some(record.clone()));

        // Wrong partition
        assert_eq!(store.get_one("bob", record.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_range_newest_first_with_limit() {
        let store = MemoryRecordStore::new();
        for minutes in [30, 10, 20] {
            store.put(&record_at("alice", minutes)).await.unwrap();
        }
        store.put(&record_at("bob", 5)).await.unwrap();

        let records = store.get_range("alice", 2).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].created_at > records[1].created_at);
        assert!(records.iter().all(|r| r.owner_key == "alice"));
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn test_stored_records_are_immutable() {
        let store = MemoryRecordStore::new();
        let original = record_at("alice", 0);
        store.put(&original).await.unwrap();
        store.put(&original).await.unwrap();

        let mut changed = original.clone();
        changed.amount = Decimal::new(5000, 2);
        let err = store.put(&changed).await.unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Conflict);

        let found = store.get_one("alice", original.id).await.unwrap();
        assert_eq!(found, Some(original));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_range_between_inclusive() {
        let store = MemoryRecordStore::new();
        let a = record_at("alice", 60);
        let b = record_at("alice", 30);
        let c = record_at("alice", 1);
        for r in [&a, &b, &c] {
            store.put(r).await.unwrap();
        }

        let records = store
            .get_range_between("alice", a.created_at, b.created_at, 10)
            .await
            .unwrap();
        assert_eq!(records, vec![b, a]);
    }
}
