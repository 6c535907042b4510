use std::sync::{Arc, PoisonError};
use std::time::Instant;

use tracing::{debug, error, trace, warn};

use crate::job::{Job, RunStatus};
use crate::lock;

use super::affinity;
use super::PoolShared;

/// Body of every worker thread. Returns once the pool is stopping.
pub(super) fn run(shared: Arc<PoolShared>, index: usize, cores: &[usize]) {
    affinity::pin_current_thread(shared.id, index, cores);
    trace!(pool = %shared.id, worker = index, "worker started");

    while let Some(job) = next_job(&shared) {
        execute(&shared, job);
    }

    trace!(pool = %shared.id, worker = index, "worker exiting");
}

/// Wait for a job whose dependencies are met and take it off the queue.
///
/// Sleeps on the condvar while the queue is empty. When jobs are queued but
/// none is ready, waits at most `rescan_interval` before scanning again,
/// since the blocking dependency may finish on another pool that never
/// signals this one.
fn next_job(shared: &PoolShared) -> Option<Arc<Job>> {
    let mut state = lock(&shared.state);
    loop {
        if state.stopping {
            return None;
        }
        if state.pending.is_empty() {
            state = shared
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
            continue;
        }
        if let Some(job) = state.pending.take_ready() {
            return Some(job);
        }
        let (guard, _) = shared
            .available
            .wait_timeout(state, shared.rescan_interval)
            .unwrap_or_else(PoisonError::into_inner);
        state = guard;
    }
}

fn execute(shared: &PoolShared, job: Arc<Job>) {
    debug!(pool = %shared.id, job = %job.id(), name = job.name(), priority = %job.priority(), "job started");

    let started = Instant::now();
    let status = job.run();
    let elapsed = started.elapsed();

    match status {
        RunStatus::Completed => {
            debug!(pool = %shared.id, job = %job.id(), name = job.name(), ?elapsed, "job completed");
        }
        RunStatus::Failed => {
            warn!(pool = %shared.id, job = %job.id(), name = job.name(), ?elapsed, "job failed");
        }
        RunStatus::Panicked => {
            error!(pool = %shared.id, job = %job.id(), name = job.name(), ?elapsed, "job panicked");
        }
    }

    shared.record(|m| m.record_execution(shared.id, elapsed, status));

    // Dependents of this job may be parked in our queue.
    let has_pending = !lock(&shared.state).pending.is_empty();
    if has_pending {
        shared.available.notify_all();
    }
}
