/*
 * TransactGrid Core - cross-store consistency and admission control
 *
 * Architecture:
 * - AdmissionGate: fixed-window rate limiting per caller (fails open)
 * - ResultCache: cache-aside with key normalization and owner scopes
 * - ConsistencyOrchestrator: durable write + bounded async index propagation
 * - Aggregation: summary request shape and bucket-tree assembly
 * - Observability: tracing spans, Prometheus counters
 */

// Public modules
pub mod admission;
pub mod aggregation;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod service;
pub mod telemetry;

// Re-exports
pub use admission::AdmissionGate;
pub use aggregation::{assemble, summary_spec};
pub use cache::{normalize_key, CacheKey, ResultCache};
pub use config::{
    AdmissionConfig, CacheConfig, ConfigError, CoreConfig, PropagationConfig, SaturationPolicy,
    SearchConfig,
};
pub use error::{CoreError, ErrorSeverity, Result};
pub use metrics::{AdmissionMetrics, CacheMetrics, CoreMetrics, PropagationMetrics};
pub use orchestrator::{ConsistencyOrchestrator, Propagator};
pub use service::{Collaborators, TransactionCore};
pub use telemetry::init_tracing;
