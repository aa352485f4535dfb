//! Transaction record storage
//!
//! Domain model and storage ports for the transaction core, plus the adapters
//! that implement them.
//!
//! ## Layout
//!
//! - [`domain`]: `Record`, `SummaryRecord`, the aggregation tree, search
//!   queries and the four port traits (`RecordStore`, `SearchIndex`,
//!   `CounterStore`, `CacheStore`)
//! - [`infrastructure`]: in-memory adapters and the SQLite record store
//! - [`error`]: `StorageError` shared by every port
//!
//! ## Usage
//!
//! ```rust,ignore
//! use transactgrid_storage::domain::{Currency, NewRecord, RecordStore};
//! use transactgrid_storage::infrastructure::SqliteRecordStore;
//!
//! let store = SqliteRecordStore::open("records.db")?;
//! let record = NewRecord::new("alice", dec!(19.99), Currency::Usd)
//!     .with_tags(["books"])
//!     .into_record();
//! store.put(&record).await?;
//!
//! let latest = store.get_range("alice", 10).await?;
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};
