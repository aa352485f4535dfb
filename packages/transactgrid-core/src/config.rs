//! Core configuration
//!
//! One explicit struct per component, passed in at construction. Loaded from
//! YAML (every field optional, defaults applied) and range-checked by
//! `validate()`.
//!
//! ```yaml
//! admission:
//!   requests_per_window: 10
//!   window_seconds: 60
//! cache:
//!   ttl_seconds: 300
//! propagation:
//!   workers: 4
//!   queue_capacity: 1024
//!   saturation: drop_oldest
//! search:
//!   default_size: 50
//!   max_size: 1000
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use transactgrid_storage::domain::RecordLimits;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Range validation error
    #[error("Invalid range for field '{field}': {value} not in {min}..={max}. {hint}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
        hint: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    pub fn range_with_hint(
        field: impl Into<String>,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
        hint: impl Into<String>,
    ) -> Self {
        Self::Range {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
            hint: hint.into(),
        }
    }
}

fn check_range<T>(field: &str, value: T, min: T, max: T, hint: &str) -> ConfigResult<()>
where
    T: PartialOrd + ToString,
{
    if value < min || value > max {
        return Err(ConfigError::range_with_hint(field, value, min, max, hint));
    }
    Ok(())
}

// ============================================================================
// Admission
// ============================================================================

/// Fixed-window rate limit per owner key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Requests admitted per window (1..=1000000)
    pub requests_per_window: u32,

    /// Window length in seconds (1..=86400)
    pub window_seconds: u64,

    /// Counter key prefix in the shared counter store
    pub key_prefix: String,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 10,
            window_seconds: 60,
            key_prefix: "rate_limit:".to_string(),
        }
    }
}

impl AdmissionConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range(
            "admission.requests_per_window",
            self.requests_per_window,
            1,
            1_000_000,
            "At least one request per window must be admitted",
        )?;
        check_range(
            "admission.window_seconds",
            self.window_seconds,
            1,
            86_400,
            "Window must be between one second and one day",
        )?;
        if self.key_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "admission.key_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn requests_per_window(mut self, v: u32) -> Self {
        self.requests_per_window = v;
        self
    }

    pub fn window_seconds(mut self, v: u64) -> Self {
        self.window_seconds = v;
        self
    }
}

// ============================================================================
// Result cache
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry time to live in seconds (1..=86400)
    pub ttl_seconds: u64,

    /// Normalized keys longer than this are replaced by a digest (64..=1024)
    pub max_key_length: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_key_length: 100,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range(
            "cache.ttl_seconds",
            self.ttl_seconds,
            1,
            86_400,
            "Cached aggregates must expire within a day",
        )?;
        check_range(
            "cache.max_key_length",
            self.max_key_length,
            64,
            1024,
            "Threshold must be at least the 64-character digest length",
        )
    }

    pub fn ttl_seconds(mut self, v: u64) -> Self {
        self.ttl_seconds = v;
        self
    }
}

// ============================================================================
// Index propagation
// ============================================================================

/// Behavior when the propagation queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationPolicy {
    /// Evict the oldest queued record and enqueue the new one
    #[default]
    DropOldest,
    /// Wait up to `block_timeout_ms` for a free slot, then drop the new record
    BlockWithTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Concurrent index writers (1..=256)
    pub workers: usize,

    /// Pending records held before the saturation policy applies (1..=1000000)
    pub queue_capacity: usize,

    pub saturation: SaturationPolicy,

    /// Wait bound for `block_with_timeout` (1..=60000)
    pub block_timeout_ms: u64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().clamp(1, 256),
            queue_capacity: 1024,
            saturation: SaturationPolicy::DropOldest,
            block_timeout_ms: 100,
        }
    }
}

impl PropagationConfig {
    pub fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range(
            "propagation.workers",
            self.workers,
            1,
            256,
            "At least one worker is required to drain the queue",
        )?;
        check_range(
            "propagation.queue_capacity",
            self.queue_capacity,
            1,
            1_000_000,
            "Queue must hold at least one pending record",
        )?;
        check_range(
            "propagation.block_timeout_ms",
            self.block_timeout_ms,
            1,
            60_000,
            "Writers must never block for more than a minute",
        )
    }

    pub fn workers(mut self, v: usize) -> Self {
        self.workers = v;
        self
    }

    pub fn queue_capacity(mut self, v: usize) -> Self {
        self.queue_capacity = v;
        self
    }

    pub fn saturation(mut self, v: SaturationPolicy) -> Self {
        self.saturation = v;
        self
    }

    pub fn block_timeout_ms(mut self, v: u64) -> Self {
        self.block_timeout_ms = v;
        self
    }
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hits returned when the caller gives no size
    pub default_size: usize,

    /// Upper clamp for requested sizes (1..=10000)
    pub max_size: usize,

    /// Tags reported per owner in summaries (1..=100)
    pub top_tags: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_size: 50,
            max_size: 1000,
            top_tags: 5,
        }
    }
}

impl SearchConfig {
    /// Resolve a requested size into `1..=max_size`
    pub fn clamp_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_size)
            .clamp(1, self.max_size)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range(
            "search.max_size",
            self.max_size,
            1,
            10_000,
            "Search windows beyond 10000 hits are rejected by the index",
        )?;
        check_range(
            "search.default_size",
            self.default_size,
            1,
            self.max_size,
            "Default size must fit within max_size",
        )?;
        check_range(
            "search.top_tags",
            self.top_tags,
            1,
            100,
            "Summaries report between 1 and 100 tags",
        )
    }
}

fn validate_limits(limits: &RecordLimits) -> ConfigResult<()> {
    if limits.min_amount <= Decimal::ZERO {
        return Err(ConfigError::Validation(format!(
            "records.min_amount must be positive, got {}",
            limits.min_amount
        )));
    }
    if limits.max_amount < limits.min_amount {
        return Err(ConfigError::Validation(format!(
            "records.max_amount ({}) must not be below min_amount ({})",
            limits.max_amount, limits.min_amount
        )));
    }
    check_range(
        "records.max_note_length",
        limits.max_note_length,
        0,
        100_000,
        "Notes are free text, not documents",
    )?;
    check_range(
        "records.max_tags",
        limits.max_tags,
        0,
        1000,
        "Tag sets must stay small enough to aggregate",
    )
}

// ============================================================================
// Root
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub admission: AdmissionConfig,
    pub cache: CacheConfig,
    pub propagation: PropagationConfig,
    pub search: SearchConfig,
    pub records: RecordLimits,
}

impl CoreConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.admission.validate()?;
        self.cache.validate()?;
        self.propagation.validate()?;
        self.search.validate()?;
        validate_limits(&self.records)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: CoreConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn admission(mut self, f: impl FnOnce(AdmissionConfig) -> AdmissionConfig) -> Self {
        self.admission = f(self.admission);
        self
    }

    pub fn cache(mut self, f: impl FnOnce(CacheConfig) -> CacheConfig) -> Self {
        self.cache = f(self.cache);
        self
    }

    pub fn propagation(
        mut self,
        f: impl FnOnce(PropagationConfig) -> PropagationConfig,
    ) -> Self {
        self.propagation = f(self.propagation);
        self
    }
}
