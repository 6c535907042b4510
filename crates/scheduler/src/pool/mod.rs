//! Worker pools: a fixed set of OS threads draining one priority queue.
//!
//! Split into focused submodules:
//! - `queue`: the ordered pending queue
//! - `worker`: the per-thread scan/wait/execute loop
//! - `affinity`: best-effort core pinning

mod affinity;
pub(crate) mod queue;
mod worker;

use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::PoolSettings;
use crate::error::SchedulerError;
use crate::job::Job;
use crate::{lock, write};
use crate::metrics::SchedulerMetrics;
use crate::types::PoolId;

use self::queue::PendingQueue;

pub(crate) struct QueueState {
    pub(crate) pending: PendingQueue,
    pub(crate) stopping: bool,
}

/// State shared between a pool's owner, its workers and every submitter.
pub(crate) struct PoolShared {
    pub(crate) id: PoolId,
    pub(crate) state: Mutex<QueueState>,
    /// Signalled on submit, on job completion and on stop.
    pub(crate) available: Condvar,
    pub(crate) rescan_interval: Duration,
    pub(crate) metrics: Arc<RwLock<SchedulerMetrics>>,
}

impl PoolShared {
    /// Queue `job`, or fail it straight away if the pool is stopping.
    pub(crate) fn push(&self, job: Arc<Job>) {
        debug_assert_eq!(job.pool(), self.id);

        let mut state = lock(&self.state);
        if state.stopping {
            drop(state);
            debug!(pool = %self.id, job = %job.id(), name = job.name(), "pool stopping, job discarded");
            job.discard();
            self.record(|m| m.record_discard(self.id));
            return;
        }
        state.pending.push(job);
        drop(state);
        self.available.notify_one();
    }

    pub(crate) fn queue_depth(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Mark the pool stopping and fail everything still queued with
    /// `JobError::Shutdown`. Does not wait for running jobs.
    ///
    /// The queue is emptied under the same lock that sets `stopping`, so a
    /// running job waiting on a queued one is released before anyone joins.
    pub(crate) fn request_stop(&self) {
        let drained = {
            let mut state = lock(&self.state);
            state.stopping = true;
            state.pending.drain()
        };
        self.available.notify_all();

        for job in &drained {
            job.discard();
            self.record(|m| m.record_discard(self.id));
        }
        if !drained.is_empty() {
            info!(pool = %self.id, discarded = drained.len(), "pending jobs failed at shutdown");
        }
    }

    pub(crate) fn record(&self, update: impl FnOnce(&mut SchedulerMetrics)) {
        update(&mut write(&self.metrics));
    }
}

/// A named group of worker threads with its own pending queue.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
    threads: usize,
}

impl WorkerPool {
    /// Spawn `settings.threads` workers named `jobweave-<pool>-<index>`.
    pub fn new(
        id: PoolId,
        settings: PoolSettings,
        metrics: Arc<RwLock<SchedulerMetrics>>,
    ) -> Result<Self, SchedulerError> {
        if settings.threads == 0 {
            return Err(SchedulerError::Config(format!(
                "pool '{id}' must have at least one thread"
            )));
        }

        write(&metrics).register_pool(id, settings.threads);

        let shared = Arc::new(PoolShared {
            id,
            state: Mutex::new(QueueState {
                pending: PendingQueue::default(),
                stopping: false,
            }),
            available: Condvar::new(),
            rescan_interval: settings.rescan_interval,
            metrics,
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(settings.threads),
            threads: settings.threads,
        };

        for index in 0..settings.threads {
            let name = format!("jobweave-{id}-{index}");
            let shared = Arc::clone(&pool.shared);
            let cores = settings.cores.clone();
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker::run(shared, index, &cores));

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                // Dropping `pool` stops and joins the workers spawned so far.
                Err(source) => return Err(SchedulerError::ThreadSpawn { thread: name, source }),
            }
        }

        info!(pool = %id, threads = settings.threads, cores = ?settings.cores, "worker pool started");
        Ok(pool)
    }

    pub fn id(&self) -> PoolId {
        self.shared.id
    }

    pub fn thread_count(&self) -> usize {
        self.threads
    }

    pub fn queue_depth(&self) -> usize {
        self.shared.queue_depth()
    }

    pub(crate) fn shared(&self) -> &Arc<PoolShared> {
        &self.shared
    }

    /// Fail every queued job and ask the workers to exit after their current
    /// job. Does not wait.
    pub fn request_stop(&self) {
        self.shared.request_stop();
    }

    /// Stop, then wait for every worker. Safe to call more than once.
    pub fn join(&mut self) {
        self.shared.request_stop();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!(pool = %self.shared.id, "worker thread panicked outside a job");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}
