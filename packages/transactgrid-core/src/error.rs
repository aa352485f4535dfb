use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use transactgrid_storage::StorageError;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller exceeded its window quota; retry after `reset_in`
    #[error("Admission denied: {remaining} requests remaining, window resets in {}s", reset_in.as_secs())]
    AdmissionDenied { remaining: u32, reset_in: Duration },

    /// Durable store failure; aborts the current operation
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Search index failure on a foreground read
    #[error("Index error: {0}")]
    Index(#[source] StorageError),

    /// Background index write failure (logged and counted, never returned to writers)
    #[error("Index propagation failed for record {record_id}: {reason}")]
    IndexPropagation { record_id: String, reason: String },

    #[error("Cache error: {0}")]
    Cache(String),

    /// Aggregation response does not have the expected shape
    #[error("Aggregation shape error: {0}")]
    AggregationShape(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl CoreError {
    pub fn index(err: StorageError) -> Self {
        Self::Index(err)
    }

    pub fn cache<E: fmt::Display>(e: E) -> Self {
        Self::Cache(e.to_string())
    }

    pub fn aggregation_shape(message: impl Into<String>) -> Self {
        Self::AggregationShape(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::AdmissionDenied { .. }
            | CoreError::IndexPropagation { .. }
            | CoreError::Cache(_) => ErrorSeverity::Soft,
            CoreError::Storage(_)
            | CoreError::Index(_)
            | CoreError::AggregationShape(_)
            | CoreError::Validation(_)
            | CoreError::Config(_)
            | CoreError::Metrics(_) => ErrorSeverity::Fatal,
        }
    }

    /// Retry-after guidance for admission denials
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::AdmissionDenied { reset_in, .. } => Some(*reset_in),
            _ => None,
        }
    }

    /// Caller-facing message; internal detail is never included
    pub fn public_message(&self) -> String {
        match self {
            CoreError::AdmissionDenied { reset_in, .. } => format!(
                "Rate limit exceeded. Try again in {} seconds.",
                reset_in.as_secs()
            ),
            CoreError::Validation(message) => message.clone(),
            CoreError::Storage(_) => "Failed to process transaction".to_string(),
            CoreError::Index(_) | CoreError::AggregationShape(_) => {
                "Search is temporarily unavailable".to_string()
            }
            CoreError::IndexPropagation { .. }
            | CoreError::Cache(_)
            | CoreError::Config(_)
            | CoreError::Metrics(_) => "Internal error".to_string(),
        }
    }
}

/// Error severity for propagation policy
///
/// Soft failures degrade an optimization layer (cache, rate-limit counter,
/// background index write); fatal failures abort the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Soft,
    Fatal,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Soft => "soft",
            ErrorSeverity::Fatal => "fatal",
        }
    }
}

impl FromStr for ErrorSeverity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "soft" => Ok(ErrorSeverity::Soft),
            "fatal" => Ok(ErrorSeverity::Fatal),
            _ => Err(CoreError::validation(format!(
                "Invalid error severity: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
