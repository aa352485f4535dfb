//! Cache key normalization
//!
//! Raw query text becomes a key in three steps:
//!
//! 1. trim, lowercase, collapse whitespace runs to one space
//! 2. if longer than the threshold, replace with the blake3 hex digest
//! 3. map every character outside `[a-zA-Z0-9]` to `_`
//!
//! The output only contains `[a-z0-9_]` and is never longer than the
//! threshold, so normalizing twice gives the same key.
//!
//! Owner keys are not normalized: owner partitions match exactly, so the owner
//! segment is the blake3 digest of the raw key and distinct owners never share
//! a scope.

use std::fmt;

/// Length of a hex-encoded blake3 digest
pub const DIGEST_HEX_LEN: usize = 64;

pub const SEARCH_PREFIX: &str = "search:";
pub const SUMMARY_PREFIX: &str = "summary:";
pub const OWNER_PREFIX: &str = "owner:";

/// Normalize raw key text
///
/// Thresholds below [`DIGEST_HEX_LEN`] are raised to it.
pub fn normalize_key(raw: &str, max_len: usize) -> String {
    let max_len = max_len.max(DIGEST_HEX_LEN);
    let collapsed = raw
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let bounded = if collapsed.chars().count() > max_len {
        blake3::hash(collapsed.as_bytes()).to_hex().to_string()
    } else {
        collapsed
    };

    bounded
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// A namespaced, normalized cache key
///
/// Only built through the constructors below, so every key reaching the
/// cache store is normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `search:<query>:<size>`
    pub fn search(query: &str, size: usize, max_len: usize) -> Self {
        Self(format!(
            "{}{}:{}",
            SEARCH_PREFIX,
            normalize_key(query, max_len),
            size
        ))
    }

    /// Constant key of the global summary
    pub fn summary() -> Self {
        Self(format!("{}all", SUMMARY_PREFIX))
    }

    /// `owner:<owner digest>:<raw>`, removable with one owner-scope invalidation
    pub fn owner(owner_key: &str, raw: &str, max_len: usize) -> Self {
        Self(format!(
            "{}{}",
            Self::owner_scope(owner_key),
            normalize_key(raw, max_len)
        ))
    }

    /// Prefix shared by every key of one owner
    pub fn owner_scope(owner_key: &str) -> String {
        format!("{}{}:", OWNER_PREFIX, blake3::hash(owner_key.as_bytes()).to_hex())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
