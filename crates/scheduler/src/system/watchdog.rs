//! Starvation watchdog.
//!
//! Reports unstarted jobs that have been waiting on unfinished dependencies
//! for longer than one interval, together with what they are ultimately
//! waiting on. Purely diagnostic: nothing is killed, reordered or
//! rescheduled. A job queued behind a long but healthy chain is reported
//! too; true cycles cannot occur since a job can only depend on jobs that
//! were submitted before it.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::SchedulerError;
use crate::job::Job;
use crate::{lock, write};
use crate::types::{JobId, PoolId, Priority};

use super::core::SystemShared;

/// Blocked chains are followed at most this deep when looking for roots.
const MAX_BLOCKER_DEPTH: usize = 64;

const WATCHDOG_THREAD: &str = "jobweave-watchdog";

// ── Reports ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockerState {
    /// Started and still executing.
    Running,
    /// Dependencies met, waiting in its pool's queue behind other work.
    Ready,
    /// Itself waiting on unfinished dependencies.
    Blocked,
}

/// A job standing in another job's way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blocker {
    pub job: JobId,
    pub name: String,
    pub pool: PoolId,
    pub state: BlockerState,
}

impl Blocker {
    fn of(job: &Job) -> Self {
        let state = if job.is_started() {
            BlockerState::Running
        } else if job.dependencies_satisfied() {
            BlockerState::Ready
        } else {
            BlockerState::Blocked
        };
        Self {
            job: job.id(),
            name: job.name().to_string(),
            pool: job.pool(),
            state,
        }
    }
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            BlockerState::Running => "running",
            BlockerState::Ready => "ready",
            BlockerState::Blocked => "blocked",
        };
        write!(f, "{} {} ({}, {})", self.job, self.name, self.pool, state)
    }
}

/// One starved job.
#[derive(Debug, Clone, Serialize)]
pub struct StarvationReport {
    pub job: JobId,
    pub name: String,
    pub pool: PoolId,
    pub priority: Priority,
    pub waited: Duration,
    /// Unfinished direct dependencies.
    pub blockers: Vec<Blocker>,
    /// Running or ready jobs at the bottom of the blocked chains.
    pub root_blockers: Vec<Blocker>,
}

impl StarvationReport {
    /// `None` when every dependency has finished, i.e. the job is merely
    /// queued behind other work.
    pub(super) fn build(job: &Job) -> Option<Self> {
        let unmet = job.unmet_dependencies();
        if unmet.is_empty() {
            return None;
        }
        Some(Self {
            job: job.id(),
            name: job.name().to_string(),
            pool: job.pool(),
            priority: job.priority(),
            waited: job.waited(),
            blockers: unmet.iter().map(|dep| Blocker::of(dep)).collect(),
            root_blockers: root_blockers(&unmet),
        })
    }
}

fn root_blockers(direct: &[Arc<Job>]) -> Vec<Blocker> {
    let mut visited = HashSet::new();
    let mut roots = Vec::new();
    let mut frontier: Vec<(Arc<Job>, usize)> =
        direct.iter().map(|job| (Arc::clone(job), 0)).collect();

    while let Some((job, depth)) = frontier.pop() {
        if !visited.insert(job.id()) {
            continue;
        }
        let blocker = Blocker::of(&job);
        if blocker.state == BlockerState::Blocked && depth < MAX_BLOCKER_DEPTH {
            frontier.extend(job.unmet_dependencies().into_iter().map(|dep| (dep, depth + 1)));
        } else {
            roots.push(blocker);
        }
    }

    roots.sort_by_key(|b| b.job);
    roots
}

fn join_blockers(blockers: &[Blocker]) -> String {
    blockers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Thread ──────────────────────────────────────────────────────────

struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

pub(super) struct Watchdog {
    signal: Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub(super) fn spawn(shared: Arc<SystemShared>, interval: Duration) -> Result<Self, SchedulerError> {
        let signal = Arc::new(StopSignal {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });

        let thread_signal = Arc::clone(&signal);
        let thread = thread::Builder::new()
            .name(WATCHDOG_THREAD.into())
            .spawn(move || watch(&shared, &thread_signal, interval))
            .map_err(|source| SchedulerError::ThreadSpawn {
                thread: WATCHDOG_THREAD.into(),
                source,
            })?;

        Ok(Self {
            signal,
            thread: Some(thread),
        })
    }

    /// Wake the thread and wait for it to exit.
    pub(super) fn stop(&mut self) {
        *lock(&self.signal.stopped) = true;
        self.signal.wake.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("watchdog thread panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(shared: &SystemShared, signal: &StopSignal, interval: Duration) {
    info!(interval_ms = interval.as_millis() as u64, "watchdog started");

    loop {
        let stopped = lock(&signal.stopped);
        let (stopped, _) = signal
            .wake
            .wait_timeout_while(stopped, interval, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        if *stopped {
            break;
        }
        drop(stopped);

        let reports = shared.scan_for_starvation(interval);
        for report in &reports {
            warn!(
                job = %report.job,
                name = %report.name,
                pool = %report.pool,
                priority = %report.priority,
                waited_ms = report.waited.as_millis() as u64,
                blockers = %join_blockers(&report.blockers),
                root_blockers = %join_blockers(&report.root_blockers),
                "job starved: dependencies still unfinished"
            );
        }
        write(&shared.metrics).record_scan(reports.len());
    }

    info!("watchdog stopped");
}
