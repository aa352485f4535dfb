//! Prometheus metrics for the admission, cache and propagation layers

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

/// AdmissionGate metrics
#[derive(Clone)]
pub struct AdmissionMetrics {
    pub allowed: IntCounter,
    pub denied: IntCounter,
    /// Requests admitted because the counter store failed
    pub fail_open: IntCounter,
}

impl AdmissionMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            allowed: register_int_counter_with_registry!(
                Opts::new("admission_allowed_total", "Requests admitted"),
                registry
            )?,
            denied: register_int_counter_with_registry!(
                Opts::new("admission_denied_total", "Requests denied by the window limit"),
                registry
            )?,
            fail_open: register_int_counter_with_registry!(
                Opts::new(
                    "admission_fail_open_total",
                    "Requests admitted because the counter store was unreachable"
                ),
                registry
            )?,
        })
    }
}

/// ResultCache metrics
#[derive(Clone)]
pub struct CacheMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub writes: IntCounter,
    /// Store errors and (de)serialization failures, all degraded to misses or skipped writes
    pub failures: IntCounter,
}

impl CacheMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            hits: register_int_counter_with_registry!(
                Opts::new("result_cache_hits_total", "Result cache hits"),
                registry
            )?,
            misses: register_int_counter_with_registry!(
                Opts::new("result_cache_misses_total", "Result cache misses"),
                registry
            )?,
            writes: register_int_counter_with_registry!(
                Opts::new("result_cache_writes_total", "Result cache writes"),
                registry
            )?,
            failures: register_int_counter_with_registry!(
                Opts::new("result_cache_failures_total", "Result cache failures"),
                registry
            )?,
        })
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.get() as f64;
        let total = hits + self.misses.get() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Index propagation metrics
///
/// `enqueued - succeeded - failed - dropped` is the number of records still
/// queued or in flight; any non-zero `failed` or `dropped` means the index is
/// missing records until an external reconciliation pass.
#[derive(Clone)]
pub struct PropagationMetrics {
    pub enqueued: IntCounter,
    pub succeeded: IntCounter,
    pub failed: IntCounter,
    pub dropped: IntCounter,
    pub queue_depth: IntGauge,
    pub in_flight: IntGauge,
}

impl PropagationMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            enqueued: register_int_counter_with_registry!(
                Opts::new("propagation_enqueued_total", "Records queued for indexing"),
                registry
            )?,
            succeeded: register_int_counter_with_registry!(
                Opts::new("propagation_succeeded_total", "Records written to the index"),
                registry
            )?,
            failed: register_int_counter_with_registry!(
                Opts::new("propagation_failed_total", "Index writes that failed"),
                registry
            )?,
            dropped: register_int_counter_with_registry!(
                Opts::new(
                    "propagation_dropped_total",
                    "Records dropped because the queue was saturated"
                ),
                registry
            )?,
            queue_depth: register_int_gauge_with_registry!(
                Opts::new("propagation_queue_depth", "Records waiting in the queue"),
                registry
            )?,
            in_flight: register_int_gauge_with_registry!(
                Opts::new("propagation_in_flight", "Index writes in progress"),
                registry
            )?,
        })
    }
}

/// All core metrics registered on one registry
#[derive(Clone)]
pub struct CoreMetrics {
    pub admission: AdmissionMetrics,
    pub cache: CacheMetrics,
    pub propagation: PropagationMetrics,
}

impl CoreMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            admission: AdmissionMetrics::new(registry)?,
            cache: CacheMetrics::new(registry)?,
            propagation: PropagationMetrics::new(registry)?,
        })
    }
}
