//! Fixed-window admission control
//!
//! One counter per owner key lives in the shared counter store. A request is
//! admitted when the current count is below the limit; the admitting increment
//! that creates the window (post-increment value 1) also sets its expiry, so
//! the expiry is set once per window and never pushed forward.
//!
//! The read and the increment are two store calls. Concurrent callers that
//! all observe `limit - 1` are all admitted, so a window admits at most
//! `limit + (concurrent callers - 1)` requests. This overshoot is accepted.
//!
//! Counter store failures fail open: the request is admitted, logged and
//! counted in `admission_fail_open_total`.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use transactgrid_storage::domain::CounterStore;
use transactgrid_storage::Result as StorageResult;

use crate::config::AdmissionConfig;
use crate::error::{CoreError, Result};
use crate::metrics::AdmissionMetrics;

pub struct AdmissionGate {
    store: Arc<dyn CounterStore>,
    config: AdmissionConfig,
    metrics: AdmissionMetrics,
}

impl AdmissionGate {
    pub fn new(
        store: Arc<dyn CounterStore>,
        config: AdmissionConfig,
        metrics: AdmissionMetrics,
    ) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    fn counter_key(&self, owner_key: &str) -> String {
        format!("{}{}", self.config.key_prefix, owner_key)
    }

    /// Admit or deny one request for `owner_key`
    pub async fn allow(&self, owner_key: &str) -> bool {
        match self.try_allow(owner_key).await {
            Ok(true) => {
                self.metrics.allowed.inc();
                true
            }
            Ok(false) => {
                self.metrics.denied.inc();
                debug!(owner = owner_key, "Rate limit exceeded");
                false
            }
            Err(e) => {
                self.metrics.fail_open.inc();
                warn!(owner = owner_key, error = %e, "Counter store unavailable, admitting request");
                true
            }
        }
    }

    async fn try_allow(&self, owner_key: &str) -> StorageResult<bool> {
        let key = self.counter_key(owner_key);
        let limit = i64::from(self.config.requests_per_window);

        let current = self.store.get(&key).await?.unwrap_or(0);
        if current >= limit {
            // A full window without expiry would never close
            if self.store.ttl(&key).await?.is_none() {
                self.store.expire(&key, self.config.window()).await?;
            }
            return Ok(false);
        }

        let count = self.store.increment(&key).await?;
        if count == 1 {
            self.store.expire(&key, self.config.window()).await?;
        }
        Ok(true)
    }

    /// Requests left in the current window; the full limit on store failure
    pub async fn remaining(&self, owner_key: &str) -> u32 {
        let limit = self.config.requests_per_window;
        match self.store.get(&self.counter_key(owner_key)).await {
            Ok(count) => {
                let used = count.unwrap_or(0).clamp(0, i64::from(limit));
                limit - used as u32
            }
            Err(e) => {
                warn!(owner = owner_key, error = %e, "Failed to read rate limit counter");
                limit
            }
        }
    }

    /// Time until the current window closes; zero when no window is open or on failure
    pub async fn reset_in(&self, owner_key: &str) -> Duration {
        match self.store.ttl(&self.counter_key(owner_key)).await {
            Ok(ttl) => ttl.unwrap_or(Duration::ZERO),
            Err(e) => {
                warn!(owner = owner_key, error = %e, "Failed to read rate limit expiry");
                Duration::ZERO
            }
        }
    }

    /// Drop the owner's window
    pub async fn reset(&self, owner_key: &str) {
        if let Err(e) = self.store.delete(&self.counter_key(owner_key)).await {
            warn!(owner = owner_key, error = %e, "Failed to reset rate limit counter");
        }
    }

    /// `allow`, with quota metadata on denial
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AdmissionDenied` with the remaining quota and the
    /// time until the window resets.
    pub async fn check(&self, owner_key: &str) -> Result<()> {
        if self.allow(owner_key).await {
            return Ok(());
        }
        Err(CoreError::AdmissionDenied {
            remaining: self.remaining(owner_key).await,
            reset_in: self.reset_in(owner_key).await,
        })
    }
}
