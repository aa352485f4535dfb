//! Bounded background propagation to the search index
//!
//! Durable writes hand their record to a fixed-size queue drained by a fixed
//! number of worker tasks. Each record gets one index attempt. Outcomes are
//! counted in `PropagationMetrics` and never reported back to the writer.
//!
//! When the queue is full the configured `SaturationPolicy` applies:
//! `DropOldest` evicts the oldest queued record, `BlockWithTimeout` waits a
//! bounded time for a slot and then drops the new record. Either way the
//! writer is never blocked longer than `block_timeout_ms`.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use transactgrid_storage::domain::{Record, SearchIndex};

use crate::cache::ResultCache;
use crate::config::{PropagationConfig, SaturationPolicy};
use crate::error::CoreError;
use crate::metrics::PropagationMetrics;

struct Shared {
    index: Arc<dyn SearchIndex>,
    cache: Option<Arc<ResultCache>>,
    config: PropagationConfig,
    metrics: PropagationMetrics,
    queue: Mutex<VecDeque<Record>>,
    /// Popped but not yet finished; only changed while holding `queue`
    in_flight: AtomicUsize,
    work_ready: Notify,
    space_ready: Notify,
    idle: Notify,
    shutdown: CancellationToken,
}

impl Shared {
    /// Enqueue if there is room, otherwise hand the record back
    fn try_push(&self, record: Record) -> Result<(), Record> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.config.queue_capacity {
            return Err(record);
        }
        queue.push_back(record);
        self.metrics.queue_depth.set(queue.len() as i64);
        drop(queue);

        self.metrics.enqueued.inc();
        self.work_ready.notify_one();
        Ok(())
    }

    /// Enqueue, evicting the oldest record when full
    fn push_evicting(&self, record: Record) {
        let mut queue = self.queue.lock();
        let evicted = if queue.len() >= self.config.queue_capacity {
            queue.pop_front()
        } else {
            None
        };
        queue.push_back(record);
        self.metrics.queue_depth.set(queue.len() as i64);
        drop(queue);

        self.metrics.enqueued.inc();
        if let Some(old) = evicted {
            self.metrics.dropped.inc();
            warn!(
                record_id = %old.id,
                owner = %old.owner_key,
                "Propagation queue full, dropped oldest record"
            );
        }
        self.work_ready.notify_one();
    }

    fn pop(&self) -> Option<Record> {
        let mut queue = self.queue.lock();
        let record = queue.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.metrics.queue_depth.set(queue.len() as i64);
        drop(queue);

        self.metrics.in_flight.inc();
        self.space_ready.notify_one();
        Some(record)
    }

    fn finish_one(&self) {
        {
            let _queue = self.queue.lock();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        self.metrics.in_flight.dec();
        if self.is_idle() {
            self.idle.notify_waiters();
        }
    }

    fn is_idle(&self) -> bool {
        let queue = self.queue.lock();
        queue.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0
    }

    async fn propagate(&self, record: Record) {
        match self.index.index(&record).await {
            Ok(()) => {
                self.metrics.succeeded.inc();
                debug!(record_id = %record.id, owner = %record.owner_key, "Record indexed");
                if let Some(cache) = &self.cache {
                    cache.invalidate_all(&record.owner_key).await;
                }
            }
            Err(e) => {
                self.metrics.failed.inc();
                let failure = CoreError::IndexPropagation {
                    record_id: record.id.to_string(),
                    reason: e.to_string(),
                };
                warn!(owner = %record.owner_key, error = %failure, "Index propagation failed");
            }
        }
    }
}

async fn run_worker(shared: Arc<Shared>, worker_id: usize) {
    debug!("Propagation worker {} started", worker_id);
    loop {
        let ready = shared.work_ready.notified();
        tokio::pin!(ready);
        ready.as_mut().enable();

        if let Some(record) = shared.pop() {
            shared.propagate(record).await;
            shared.finish_one();
            continue;
        }

        // Queue is drained; stop only once shutdown was requested
        if shared.shutdown.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = &mut ready => {}
            _ = shared.shutdown.cancelled() => {}
        }
    }
    debug!("Propagation worker {} stopped", worker_id);
}

/// Worker pool that copies durable records into the search index
pub struct Propagator {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Propagator {
    /// Spawn the workers on the current Tokio runtime
    ///
    /// When `cache` is given, each successful index write invalidates the
    /// owner's cache scope.
    pub fn start(
        index: Arc<dyn SearchIndex>,
        cache: Option<Arc<ResultCache>>,
        config: PropagationConfig,
        metrics: PropagationMetrics,
    ) -> Self {
        let worker_count = config.workers.max(1);
        let shared = Arc::new(Shared {
            index,
            cache,
            queue: Mutex::new(VecDeque::with_capacity(config.queue_capacity.min(4096))),
            config,
            metrics,
            in_flight: AtomicUsize::new(0),
            work_ready: Notify::new(),
            space_ready: Notify::new(),
            idle: Notify::new(),
            shutdown: CancellationToken::new(),
        });

        let workers = (0..worker_count)
            .map(|worker_id| tokio::spawn(run_worker(shared.clone(), worker_id)))
            .collect();

        info!(
            "Propagation pool started ({} workers, capacity {}, {:?})",
            worker_count, shared.config.queue_capacity, shared.config.saturation
        );

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Queue a record for indexing
    ///
    /// Returns `false` if the record itself was dropped (saturated queue
    /// under `BlockWithTimeout`, or the pool is shut down).
    pub async fn submit(&self, record: Record) -> bool {
        if self.shared.shutdown.is_cancelled() {
            self.shared.metrics.dropped.inc();
            warn!(record_id = %record.id, "Propagation pool stopped, record not queued");
            return false;
        }

        match self.shared.config.saturation {
            SaturationPolicy::DropOldest => {
                self.shared.push_evicting(record);
                true
            }
            SaturationPolicy::BlockWithTimeout => self.submit_blocking(record).await,
        }
    }

    async fn submit_blocking(&self, record: Record) -> bool {
        let deadline = Instant::now() + self.shared.config.block_timeout();
        let mut record = record;
        loop {
            let space = self.shared.space_ready.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            match self.shared.try_push(record) {
                Ok(()) => return true,
                Err(back) => record = back,
            }

            if tokio::time::timeout_at(deadline, space).await.is_err() {
                self.shared.metrics.dropped.inc();
                warn!(
                    record_id = %record.id,
                    owner = %record.owner_key,
                    "Propagation queue full after {:?}, dropped record",
                    self.shared.config.block_timeout()
                );
                return false;
            }
        }
    }

    /// Records waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Wait until every queued record has been attempted
    pub async fn flush(&self) {
        loop {
            let idle = self.shared.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.shared.is_idle() {
                return;
            }
            idle.await;
        }
    }

    /// Drain the queue, then stop the workers
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(e) = handle.await {
                error!("Propagation worker terminated abnormally: {}", e);
            }
        }
        info!("Propagation pool stopped");
    }
}

impl Drop for Propagator {
    fn drop(&mut self) {
        // Workers drain what is queued and exit
        self.shared.shutdown.cancel();
    }
}
