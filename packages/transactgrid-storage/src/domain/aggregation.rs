//! Typed bucket-aggregation model
//!
//! Requests are trees of [`AggregationSpec`]; responses are trees of
//! [`AggregationNode`], a tagged variant that is either a list of buckets or a
//! single metric. Walking the typed tree replaces untyped map lookups.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::query::IndexField;

// ═══════════════════════════════════════════════════════════════════════════
// Request
// ═══════════════════════════════════════════════════════════════════════════

/// Aggregation operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AggregationKind {
    /// Group documents by field value; `size` caps the bucket count
    Terms { field: IndexField, size: Option<usize> },
    Sum { field: IndexField },
    Avg { field: IndexField },
    Max { field: IndexField },
    Min { field: IndexField },
}

/// Named aggregation with nested sub-aggregations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub name: String,
    pub kind: AggregationKind,
    #[serde(default)]
    pub subs: Vec<AggregationSpec>,
}

impl AggregationSpec {
    fn leaf(name: impl Into<String>, kind: AggregationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            subs: Vec::new(),
        }
    }

    pub fn terms(name: impl Into<String>, field: IndexField) -> Self {
        Self::leaf(name, AggregationKind::Terms { field, size: None })
    }

    pub fn sum(name: impl Into<String>, field: IndexField) -> Self {
        Self::leaf(name, AggregationKind::Sum { field })
    }

    pub fn avg(name: impl Into<String>, field: IndexField) -> Self {
        Self::leaf(name, AggregationKind::Avg { field })
    }

    pub fn max(name: impl Into<String>, field: IndexField) -> Self {
        Self::leaf(name, AggregationKind::Max { field })
    }

    pub fn min(name: impl Into<String>, field: IndexField) -> Self {
        Self::leaf(name, AggregationKind::Min { field })
    }

    /// Cap the bucket count of a terms aggregation (no-op for metrics)
    pub fn size(mut self, n: usize) -> Self {
        if let AggregationKind::Terms { size, .. } = &mut self.kind {
            *size = Some(n);
        }
        self
    }

    pub fn sub(mut self, spec: AggregationSpec) -> Self {
        self.subs.push(spec);
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Response
// ═══════════════════════════════════════════════════════════════════════════

/// One node of an aggregation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationNode {
    /// Terms result, in the order the index ranked them
    Buckets { buckets: Vec<Bucket> },
    /// Scalar result; `None` when the index reported no value (empty input)
    Metric { value: Option<Decimal> },
}

impl AggregationNode {
    pub fn buckets(buckets: Vec<Bucket>) -> Self {
        AggregationNode::Buckets { buckets }
    }

    pub fn metric(value: Option<Decimal>) -> Self {
        AggregationNode::Metric { value }
    }

    pub fn as_buckets(&self) -> Option<&[Bucket]> {
        match self {
            AggregationNode::Buckets { buckets } => Some(buckets),
            AggregationNode::Metric { .. } => None,
        }
    }

    /// `Some(value)` for metric nodes, `None` for bucket nodes
    pub fn as_metric(&self) -> Option<Option<Decimal>> {
        match self {
            AggregationNode::Metric { value } => Some(*value),
            AggregationNode::Buckets { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AggregationNode::Buckets { .. } => "buckets",
            AggregationNode::Metric { .. } => "metric",
        }
    }
}

/// A group of documents sharing one field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: String,
    pub doc_count: u64,
    #[serde(default)]
    pub aggregations: BTreeMap<String, AggregationNode>,
}

impl Bucket {
    pub fn new(key: impl Into<String>, doc_count: u64) -> Self {
        Self {
            key: key.into(),
            doc_count,
            aggregations: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, node: AggregationNode) -> Self {
        self.aggregations.insert(name.into(), node);
        self
    }

    pub fn sub(&self, name: &str) -> Option<&AggregationNode> {
        self.aggregations.get(name)
    }
}

/// Root of an aggregation response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTree {
    #[serde(default)]
    pub aggregations: BTreeMap<String, AggregationNode>,
}

impl BucketTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, node: AggregationNode) -> Self {
        self.aggregations.insert(name.into(), node);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AggregationNode> {
        self.aggregations.get(name)
    }
}
