//! Domain layer
//!
//! # Domain Models
//!
//! - `Record` / `NewRecord`: immutable transaction record and its caller input
//! - `SummaryRecord`: per-owner aggregate view (derived, never authoritative)
//! - `AggregationSpec` / `BucketTree`: typed aggregation request and response
//! - `SearchQuery`: term and multi-match queries
//!
//! # Port Traits
//!
//! - `RecordStore`: durable store (source of truth)
//! - `SearchIndex`: eventually consistent search/aggregation copy
//! - `CounterStore`, `CacheStore`: shared fast stores

pub mod aggregation;
pub mod ports;
pub mod query;
pub mod record;
pub mod summary;

pub use aggregation::{AggregationKind, AggregationNode, AggregationSpec, Bucket, BucketTree};
pub use ports::{CacheStore, CounterStore, RecordStore, SearchIndex};
pub use query::{Fuzziness, IndexField, SearchQuery};
pub use record::{Currency, NewRecord, Record, RecordId, RecordLimits};
pub use summary::{SummaryRecord, TagFrequency};
