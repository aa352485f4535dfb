//! Infrastructure layer - port adapters
//!
//! - `memory`: in-process record store, search index, counter and cache stores
//! - `sqlite` (feature `sqlite`): durable record store

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{MemoryCacheStore, MemoryCounterStore, MemoryRecordStore, MemorySearchIndex};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;
