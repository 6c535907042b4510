use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::job::RunStatus;
use crate::types::PoolId;

/// Counters for a single pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolMetrics {
    /// Worker threads in the pool.
    pub threads: usize,
    /// Jobs waiting in the queue at snapshot time.
    pub queue_depth: usize,
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_panicked: u64,
    /// Jobs failed with `Shutdown` without running.
    pub jobs_discarded: u64,
    /// Mean execution time over every job that ran.
    pub avg_job_duration: Duration,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl PoolMetrics {
    /// Jobs that actually ran, whatever their outcome.
    pub fn jobs_executed(&self) -> u64 {
        self.jobs_completed + self.jobs_failed + self.jobs_panicked
    }
}

/// Job system metrics. Snapshots are handed out by value.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    pub pools: BTreeMap<PoolId, PoolMetrics>,
    /// Completed watchdog passes.
    pub watchdog_scans: u64,
    /// Starvation reports produced across all passes.
    pub stalls_reported: u64,
}

impl SchedulerMetrics {
    pub fn pool(&self, pool: PoolId) -> PoolMetrics {
        self.pools.get(&pool).cloned().unwrap_or_default()
    }

    pub(crate) fn register_pool(&mut self, pool: PoolId, threads: usize) {
        self.pools.entry(pool).or_default().threads = threads;
    }

    pub(crate) fn record_submit(&mut self, pool: PoolId) {
        self.pools.entry(pool).or_default().jobs_submitted += 1;
    }

    /// Record one job execution.
    pub(crate) fn record_execution(&mut self, pool: PoolId, duration: Duration, status: RunStatus) {
        let m = self.pools.entry(pool).or_default();
        match status {
            RunStatus::Completed => m.jobs_completed += 1,
            RunStatus::Failed => m.jobs_failed += 1,
            RunStatus::Panicked => m.jobs_panicked += 1,
        }
        m.last_completed_at = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let count = m.jobs_executed();
        m.avg_job_duration = if count == 1 {
            duration
        } else {
            let prev_nanos = m.avg_job_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }

    pub(crate) fn record_discard(&mut self, pool: PoolId) {
        self.pools.entry(pool).or_default().jobs_discarded += 1;
    }

    pub(crate) fn record_scan(&mut self, stalls: usize) {
        self.watchdog_scans += 1;
        self.stalls_reported += stalls as u64;
    }
}
