//! The shared job record.
//!
//! A [`Job`] is owned through `Arc` by whoever still needs it to exist: the
//! pool queue until a worker takes it, the worker while it runs, and the
//! caller's [`Handle`](crate::Handle). Dependents and the in-flight registry
//! only hold `Weak` references, so a finished job whose handle was dropped is
//! freed even if later jobs named it as a dependency.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use crate::error::JobError;
use crate::lock;
use crate::types::{JobId, JobState, PoolId, Priority};

pub(crate) type JobValue = Arc<dyn Any + Send + Sync>;
pub(crate) type JobOutcome = Result<JobValue, JobError>;
pub(crate) type JobWork = Box<dyn FnOnce() -> JobOutcome + Send>;

/// How a single execution ended. Feeds metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunStatus {
    Completed,
    Failed,
    Panicked,
}

pub(crate) struct Job {
    id: JobId,
    name: String,
    priority: Priority,
    pool: PoolId,
    dependencies: Vec<Weak<Job>>,
    submitted_at: Instant,
    work: Mutex<Option<JobWork>>,
    started: AtomicBool,
    finished: AtomicBool,
    outcome: Mutex<Option<JobOutcome>>,
    done: Condvar,
}

impl Job {
    pub(crate) fn new(
        name: String,
        priority: Priority,
        pool: PoolId,
        dependencies: Vec<Weak<Job>>,
        work: JobWork,
    ) -> Self {
        Self {
            id: JobId::next(),
            name,
            priority,
            pool,
            dependencies,
            submitted_at: Instant::now(),
            work: Mutex::new(Some(work)),
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> JobId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn pool(&self) -> PoolId {
        self.pool
    }

    pub(crate) fn waited(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> JobState {
        if self.is_finished() {
            JobState::Finished
        } else if self.is_started() {
            JobState::Running
        } else {
            JobState::Queued
        }
    }

    /// A dependency is satisfied once it finished (successfully or not) or
    /// once nothing keeps it alive any more.
    pub(crate) fn dependencies_satisfied(&self) -> bool {
        self.dependencies
            .iter()
            .all(|dep| dep.upgrade().map_or(true, |job| job.is_finished()))
    }

    /// Live dependencies that have not finished yet.
    pub(crate) fn unmet_dependencies(&self) -> Vec<Arc<Job>> {
        self.dependencies
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|job| !job.is_finished())
            .collect()
    }

    /// Execute the work on the calling thread and publish its outcome.
    ///
    /// Only the worker that removed the job from its queue calls this, so the
    /// work is always present. Panics are caught and stored as
    /// [`JobError::Panicked`].
    pub(crate) fn run(&self) -> RunStatus {
        self.started.store(true, Ordering::Release);

        let work = lock(&self.work).take();
        let outcome = match work {
            Some(work) => match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(outcome) => outcome,
                Err(payload) => Err(JobError::Panicked(panic_message(payload.as_ref()))),
            },
            None => Err(JobError::failed("job body was already taken")),
        };

        let status = match &outcome {
            Ok(_) => RunStatus::Completed,
            Err(JobError::Panicked(_)) => RunStatus::Panicked,
            Err(_) => RunStatus::Failed,
        };
        self.complete(outcome);
        status
    }

    /// Fail a job that will never run because its pool is stopping.
    pub(crate) fn discard(&self) {
        // Drop the body first so anything it captured is released now rather
        // than whenever the last handle goes away.
        let work = lock(&self.work).take();
        drop(work);
        self.complete(Err(JobError::Shutdown));
    }

    fn complete(&self, outcome: JobOutcome) {
        let mut slot = lock(&self.outcome);
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        *slot = Some(outcome);
        self.finished.store(true, Ordering::Release);
        drop(slot);
        self.done.notify_all();
    }

    /// Block until the job finished and return a copy of its outcome.
    pub(crate) fn wait(&self) -> JobOutcome {
        let slot = lock(&self.outcome);
        let slot = self
            .done
            .wait_while(slot, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        clone_outcome(slot.as_ref())
    }

    /// Like [`Job::wait`], giving up after `timeout`.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> Option<JobOutcome> {
        let slot = lock(&self.outcome);
        let (slot, _) = self
            .done
            .wait_timeout_while(slot, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|outcome| clone_outcome(Some(outcome)))
    }
}

fn clone_outcome(outcome: Option<&JobOutcome>) -> JobOutcome {
    match outcome {
        Some(Ok(value)) => Ok(Arc::clone(value)),
        Some(Err(err)) => Err(err.clone()),
        None => Err(JobError::failed("job finished without an outcome")),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("pool", &self.pool)
            .field("state", &self.state())
            .finish()
    }
}
