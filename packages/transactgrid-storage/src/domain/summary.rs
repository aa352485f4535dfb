//! Per-owner aggregate views
//!
//! Derived data: recomputed from the search index on a cache miss and never
//! persisted authoritatively.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag with its document frequency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFrequency {
    pub tag: String,
    pub count: u64,
}

/// Aggregated view of one owner's records
///
/// Optional fields stay `None` when the backing sub-aggregation was absent,
/// so callers can tell "not computed" apart from zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub owner_key: String,
    pub total_transactions: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub total_amount_by_currency: BTreeMap<String, Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_used_currency: Option<String>,
    /// Ordered as reported by the index (most frequent first)
    #[serde(default)]
    pub top_tags: Vec<TagFrequency>,
}

impl SummaryRecord {
    pub fn new(owner_key: impl Into<String>, total_transactions: u64) -> Self {
        Self {
            owner_key: owner_key.into(),
            total_transactions,
            ..Default::default()
        }
    }

    /// Frequency of `tag` among the top tags, if it made the cut
    pub fn tag_count(&self, tag: &str) -> Option<u64> {
        self.top_tags.iter().find(|t| t.tag == tag).map(|t| t.count)
    }
}
