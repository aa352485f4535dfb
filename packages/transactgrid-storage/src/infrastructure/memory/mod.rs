//! In-process adapters for every port
//!
//! Used by tests and single-node deployments. All of them are cheap to
//! construct and safe to share behind an `Arc`.

mod cache;
mod counter;
mod index;
mod records;

pub use cache::MemoryCacheStore;
pub use counter::MemoryCounterStore;
pub use index::{MemorySearchIndex, DEFAULT_TERMS_SIZE};
pub use records::MemoryRecordStore;
