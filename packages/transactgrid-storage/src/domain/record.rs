//! Transaction records
//!
//! A [`Record`] is immutable once written. Callers hand in a [`NewRecord`]
//! (identifier and timestamp optional), which is validated against
//! [`RecordLimits`] and then frozen by [`NewRecord::into_record`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Result, StorageError};

// ═══════════════════════════════════════════════════════════════════════════
// Identity
// ═══════════════════════════════════════════════════════════════════════════

/// Time-ordered record identifier (UUID v7)
///
/// The leading 48 bits are a millisecond Unix timestamp, so the natural
/// ordering of identifiers follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Generate a fresh identifier for "now"
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RecordId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| StorageError::serialization(format!("Invalid record id '{}': {}", s, e)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Currency
// ═══════════════════════════════════════════════════════════════════════════

/// Supported settlement currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Cad,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Jpy,
        Currency::Cad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Cad => "CAD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                StorageError::validation(format!(
                    "Currency must be one of: USD, EUR, GBP, JPY, CAD (got '{}')",
                    s
                ))
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Limits
// ═══════════════════════════════════════════════════════════════════════════

/// Bounds enforced on every incoming record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordLimits {
    /// Smallest accepted amount (inclusive)
    pub min_amount: Decimal,
    /// Amount ceiling (inclusive)
    pub max_amount: Decimal,
    /// Maximum note length in characters
    pub max_note_length: usize,
    /// Maximum number of distinct tags
    pub max_tags: usize,
}

impl Default for RecordLimits {
    fn default() -> Self {
        Self {
            min_amount: Decimal::new(1, 2),
            max_amount: Decimal::new(100_000_000, 2),
            max_note_length: 500,
            max_tags: 10,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════════

/// Caller-supplied record, before identity assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub owner_key: String,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl NewRecord {
    pub fn new(owner_key: impl Into<String>, amount: Decimal, currency: Currency) -> Self {
        Self {
            id: None,
            owner_key: owner_key.into(),
            amount,
            currency,
            created_at: None,
            note: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    /// Check the record against `limits`
    ///
    /// # Errors
    ///
    /// Returns a `validation` error naming the first violated bound.
    pub fn validate(&self, limits: &RecordLimits) -> Result<()> {
        if self.owner_key.trim().is_empty() {
            return Err(StorageError::validation("Owner key is required"));
        }
        if self.amount < limits.min_amount {
            return Err(StorageError::validation(format!(
                "Amount must be at least {} (got {})",
                limits.min_amount, self.amount
            )));
        }
        if self.amount > limits.max_amount {
            return Err(StorageError::validation(format!(
                "Amount cannot exceed {} (got {})",
                limits.max_amount, self.amount
            )));
        }
        if let Some(note) = &self.note {
            let len = note.chars().count();
            if len > limits.max_note_length {
                return Err(StorageError::validation(format!(
                    "Note cannot exceed {} characters (got {})",
                    limits.max_note_length, len
                )));
            }
        }
        if self.tags.len() > limits.max_tags {
            return Err(StorageError::validation(format!(
                "Cannot have more than {} tags (got {})",
                limits.max_tags,
                self.tags.len()
            )));
        }
        Ok(())
    }

    /// Freeze into an immutable [`Record`], assigning id and timestamp when absent
    pub fn into_record(self) -> Record {
        Record {
            id: self.id.unwrap_or_else(RecordId::generate),
            owner_key: self.owner_key,
            amount: self.amount,
            currency: self.currency,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            note: self.note,
            tags: self.tags,
        }
    }
}

/// Immutable financial transaction record
///
/// Owned by the durable record store once written; the search index holds a
/// denormalized copy that may lag behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Partition key of the durable store
    pub owner_key: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Record {
    /// Most-recent-first ordering used by range reads and search hits
    pub fn newest_first(a: &Record, b: &Record) -> std::cmp::Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}
