use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::error::JobError;
use crate::job::{Job, JobOutcome};
use crate::types::{JobId, JobState, PoolId, Priority};

/// Typed view of a submitted job.
///
/// A handle keeps its job alive. Dropping every handle to a finished job frees
/// it, and jobs that named it as a dependency then treat it as satisfied.
pub struct Handle<T> {
    job: Arc<Job>,
    _result: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(job: Arc<Job>) -> Self {
        Self {
            job,
            _result: PhantomData,
        }
    }

    pub fn id(&self) -> JobId {
        self.job.id()
    }

    pub fn name(&self) -> &str {
        self.job.name()
    }

    pub fn priority(&self) -> Priority {
        self.job.priority()
    }

    pub fn pool(&self) -> PoolId {
        self.job.pool()
    }

    pub fn state(&self) -> JobState {
        self.job.state()
    }

    /// Non-blocking poll.
    pub fn is_finished(&self) -> bool {
        self.job.is_finished()
    }

    /// A non-owning reference for use as another job's dependency.
    pub fn dependency(&self) -> Dependency {
        Dependency(Arc::downgrade(&self.job))
    }
}

impl<T: Clone + 'static> Handle<T> {
    /// Block until the job finished and return its value or failure.
    ///
    /// Can be called any number of times; every call returns an equal result.
    /// Calling this from a job on the same single-threaded pool as the awaited
    /// job deadlocks that pool.
    pub fn wait(&self) -> Result<T, JobError> {
        downcast(self.job.wait())
    }

    /// Like [`Handle::wait`], but returns `None` if the job has not finished
    /// within `timeout`. The job itself is unaffected.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, JobError>> {
        self.job.wait_timeout(timeout).map(downcast)
    }
}

fn downcast<T: Clone + 'static>(outcome: JobOutcome) -> Result<T, JobError> {
    let value = outcome?;
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| JobError::Failed(format!("result is not a {}", type_name::<T>())))
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.job))
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.job).finish()
    }
}

/// Weak reference to a submitted job. Never keeps the job alive.
#[derive(Clone, Debug)]
pub struct Dependency(pub(crate) Weak<Job>);

impl<T> From<&Handle<T>> for Dependency {
    fn from(handle: &Handle<T>) -> Self {
        handle.dependency()
    }
}

impl From<&Dependency> for Dependency {
    fn from(dependency: &Dependency) -> Self {
        dependency.clone()
    }
}
