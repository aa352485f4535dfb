//! Result cache
//!
//! - `key`: key normalization and namespaced `CacheKey`s
//! - `result_cache`: `ResultCache`, the cache-aside wrapper

pub mod key;
mod result_cache;

pub use key::{normalize_key, CacheKey};
pub use result_cache::ResultCache;
