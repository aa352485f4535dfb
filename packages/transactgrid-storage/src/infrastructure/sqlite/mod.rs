//! SQLite record store
//!
//! File-based durable storage for records, partitioned by owner key.
//! Timestamps are stored as fixed-width RFC 3339 text (nanoseconds, `Z`),
//! so lexicographic order matches chronological order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::{Currency, Record, RecordId, RecordStore};
use crate::{Result, StorageError};

const SELECT_COLUMNS: &str =
    "SELECT record_id, owner_key, amount, currency, created_at, note, tags FROM records";

/// SQLite-backed `RecordStore`
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

/// Row as stored, before parsing into domain types
struct RawRow {
    id: String,
    owner_key: String,
    amount: String,
    currency: String,
    created_at: String,
    note: Option<String>,
    tags: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_key: row.get(1)?,
            amount: row.get(2)?,
            currency: row.get(3)?,
            created_at: row.get(4)?,
            note: row.get(5)?,
            tags: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<Record> {
        let amount = Decimal::from_str(&self.amount).map_err(|e| {
            StorageError::serialization(format!("Invalid amount '{}': {}", self.amount, e))
        })?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| {
                StorageError::serialization(format!(
                    "Invalid timestamp '{}': {}",
                    self.created_at, e
                ))
            })?
            .with_timezone(&Utc);
        let tags: BTreeSet<String> = serde_json::from_str(&self.tags)?;

        Ok(Record {
            id: RecordId::from_str(&self.id)?,
            owner_key: self.owner_key,
            amount,
            currency: Currency::from_str(&self.currency)?,
            created_at,
            note: self.note,
            tags,
        })
    }
}

fn timestamp_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl SqliteRecordStore {
    /// Open (or create) a store at the given path
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// In-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                owner_key TEXT NOT NULL,
                record_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                currency TEXT NOT NULL,
                created_at TEXT NOT NULL,
                note TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (owner_key, record_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_records_owner_time
             ON records(owner_key, created_at DESC, record_id DESC)",
            [],
        )?;

        Ok(())
    }

    fn query_records(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Record>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawRow::into_record).collect()
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn put(&self, record: &Record) -> Result<()> {
        let tags = serde_json::to_string(&record.tags)?;
        let existing = {
            let conn = self.conn.lock();
            let inserted = conn.execute(
                "INSERT INTO records (record_id, owner_key, amount, currency, created_at, note, tags)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (owner_key, record_id) DO NOTHING",
                params![
                    record.id.to_string(),
                    &record.owner_key,
                    record.amount.to_string(),
                    record.currency.as_str(),
                    timestamp_text(&record.created_at),
                    &record.note,
                    tags
                ],
            )?;
            if inserted == 1 {
                return Ok(());
            }
            conn.query_row(
                &format!("{} WHERE owner_key = ?1 AND record_id = ?2", SELECT_COLUMNS),
                params![&record.owner_key, record.id.to_string()],
                RawRow::from_row,
            )
            .optional()?
        };

        // Identical re-put is a no-op
        match existing.map(RawRow::into_record).transpose()? {
            Some(stored) if stored == *record => Ok(()),
            _ => Err(StorageError::conflict(&record.owner_key, record.id)),
        }
    }

    async fn get_one(&self, owner_key: &str, id: RecordId) -> Result<Option<Record>> {
        let raw = {
            let conn = self.conn.lock();
            conn.query_row(
                &format!("{} WHERE owner_key = ?1 AND record_id = ?2", SELECT_COLUMNS),
                params![owner_key, id.to_string()],
                RawRow::from_row,
            )
            .optional()?
        };
        raw.map(RawRow::into_record).transpose()
    }

    async fn get_range(&self, owner_key: &str, limit: usize) -> Result<Vec<Record>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_records(
            &format!(
                "{} WHERE owner_key = ?1 ORDER BY created_at DESC, record_id DESC LIMIT ?2",
                SELECT_COLUMNS
            ),
            params![owner_key, limit],
        )
    }

    async fn get_range_between(
        &self,
        owner_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_records(
            &format!(
                "{} WHERE owner_key = ?1 AND created_at >= ?2 AND created_at <= ?3
                 ORDER BY created_at DESC, record_id DESC LIMIT ?4",
                SELECT_COLUMNS
            ),
            params![owner_key, timestamp_text(&from), timestamp_text(&to), limit],
        )
    }
}
