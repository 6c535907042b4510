use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use tracing::info;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::job::Job;
use crate::{lock, read};
use crate::metrics::SchedulerMetrics;
use crate::pool::{PoolShared, WorkerPool};
use crate::types::{JobId, PoolId};

use super::watchdog::{StarvationReport, Watchdog};

/// State reachable from submitters and the watchdog. Outlives the
/// [`JobSystem`] if a [`Submitter`] is kept around; submissions then fail
/// with `Shutdown` because every pool has stopped.
pub(crate) struct SystemShared {
    /// Indexed by `PoolId::index`.
    pub(super) pools: Vec<Arc<PoolShared>>,
    /// Submitted jobs, for the watchdog. Weak so it never extends a job's life.
    pub(super) registry: Mutex<HashMap<JobId, Weak<Job>>>,
    pub(super) metrics: Arc<RwLock<SchedulerMetrics>>,
}

impl SystemShared {
    pub(super) fn pool(&self, pool: PoolId) -> &PoolShared {
        &self.pools[pool.index()]
    }

    /// Drop finished and freed jobs from the registry and return the rest.
    pub(super) fn live_jobs(&self) -> Vec<Arc<Job>> {
        let mut live = Vec::new();
        let mut released = Vec::new();

        let mut registry = lock(&self.registry);
        registry.retain(|_, weak| match weak.upgrade() {
            Some(job) if !job.is_finished() => {
                live.push(job);
                true
            }
            Some(job) => {
                released.push(job);
                false
            }
            None => false,
        });
        drop(registry);

        // A job's result may own handles or submitters; let them go only
        // after the registry lock is released.
        drop(released);
        live
    }

    pub(super) fn scan_for_starvation(&self, min_wait: Duration) -> Vec<StarvationReport> {
        self.live_jobs()
            .iter()
            .filter(|job| !job.is_started() && job.waited() >= min_wait)
            .filter_map(|job| StarvationReport::build(job))
            .collect()
    }
}

/// The scheduler façade: one [`WorkerPool`] per [`PoolId`] plus a watchdog.
///
/// Dropping the system (or calling [`JobSystem::shutdown`]) stops the
/// watchdog, then every pool. Jobs still pending at that point finish with
/// `JobError::Shutdown`.
pub struct JobSystem {
    pub(super) shared: Arc<SystemShared>,
    pub(super) pools: Vec<WorkerPool>,
    pub(super) watchdog: Option<Watchdog>,
    pub(super) config: SchedulerConfig,
}

impl JobSystem {
    /// Validate `config`, start every pool and, if enabled, the watchdog.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;

        let metrics = Arc::new(RwLock::new(SchedulerMetrics::default()));
        let mut pools = Vec::with_capacity(PoolId::ALL.len());
        for pool in PoolId::ALL {
            pools.push(WorkerPool::new(pool, config.pool_settings(pool), Arc::clone(&metrics))?);
        }

        let shared = Arc::new(SystemShared {
            pools: pools.iter().map(|p| Arc::clone(p.shared())).collect(),
            registry: Mutex::new(HashMap::new()),
            metrics,
        });

        let watchdog = if config.watchdog_enabled {
            Some(Watchdog::spawn(Arc::clone(&shared), config.watchdog_interval())?)
        } else {
            None
        };

        info!(
            general = config.resolved_threads(PoolId::General),
            io = config.resolved_threads(PoolId::Io),
            render = config.resolved_threads(PoolId::Render),
            simulation = config.resolved_threads(PoolId::Simulation),
            watchdog = config.watchdog_enabled,
            "job system started"
        );

        Ok(Self {
            shared,
            pools,
            watchdog,
            config,
        })
    }

    /// A cloneable submission handle that job bodies can capture.
    pub fn submitter(&self) -> Submitter {
        Submitter {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Submitted jobs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.shared.live_jobs().len()
    }

    pub fn queue_depth(&self, pool: PoolId) -> usize {
        self.shared.pool(pool).queue_depth()
    }

    pub fn thread_count(&self, pool: PoolId) -> usize {
        self.config.resolved_threads(pool)
    }

    /// Snapshot of the metrics, with queue depths filled in.
    pub fn metrics(&self) -> SchedulerMetrics {
        let mut snapshot = read(&self.shared.metrics).clone();
        for pool in PoolId::ALL {
            snapshot.pools.entry(pool).or_default().queue_depth = self.queue_depth(pool);
        }
        snapshot
    }

    /// Unstarted jobs that have waited at least `min_wait` on dependencies
    /// that are still unfinished. This is the watchdog's detection pass and
    /// does not block workers beyond the registry lock.
    pub fn scan_for_starvation(&self, min_wait: Duration) -> Vec<StarvationReport> {
        self.shared.scan_for_starvation(min_wait)
    }

    /// Stop the watchdog and every pool, failing pending jobs. Returns after
    /// the jobs currently running have finished.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(mut watchdog) = self.watchdog.take() {
            watchdog.stop();
        }

        let mut pools = std::mem::take(&mut self.pools);
        if pools.is_empty() {
            return;
        }
        info!("job system shutting down");
        for pool in &pools {
            pool.request_stop();
        }
        for pool in &mut pools {
            pool.join();
        }
        info!("job system stopped");
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Submits jobs into a [`JobSystem`] from anywhere, including job bodies.
#[derive(Clone)]
pub struct Submitter {
    pub(super) shared: Arc<SystemShared>,
}
