use std::sync::Arc;

use tracing::trace;

use crate::error::JobError;
use crate::handle::{Dependency, Handle};
use crate::job::{Job, JobValue, JobWork};
use crate::{lock, write};
use crate::types::{PoolId, Priority};

use super::core::{JobSystem, Submitter, SystemShared};

/// Registry size at which `submit` prunes finished entries itself, so the
/// registry stays bounded even with the watchdog disabled.
const REGISTRY_PRUNE_EVERY: usize = 1024;

impl SystemShared {
    pub(super) fn submit<T, F>(
        &self,
        name: String,
        priority: Priority,
        pool: PoolId,
        dependencies: &[Dependency],
        work: F,
    ) -> Handle<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, JobError> + Send + 'static,
    {
        let work: JobWork = Box::new(move || work().map(|value| Arc::new(value) as JobValue));
        let deps = dependencies.iter().map(|d| d.0.clone()).collect();
        let job = Arc::new(Job::new(name, priority, pool, deps, work));

        let registered = {
            let mut registry = lock(&self.registry);
            registry.insert(job.id(), Arc::downgrade(&job));
            registry.len()
        };
        if registered % REGISTRY_PRUNE_EVERY == 0 {
            self.live_jobs();
        }

        write(&self.metrics).record_submit(pool);
        trace!(job = %job.id(), name = job.name(), %pool, %priority, deps = dependencies.len(), "job submitted");

        self.pool(pool).push(Arc::clone(&job));
        Handle::new(job)
    }
}

impl JobSystem {
    /// Submit `work` to `pool`. It runs once every dependency finished
    /// (successfully or not) or was freed. Never blocks on execution.
    pub fn submit<T, F>(
        &self,
        name: impl Into<String>,
        priority: Priority,
        pool: PoolId,
        dependencies: &[Dependency],
        work: F,
    ) -> Handle<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, JobError> + Send + 'static,
    {
        self.shared.submit(name.into(), priority, pool, dependencies, work)
    }

    /// Start building a job. Defaults to `Priority::Normal` on `PoolId::General`.
    pub fn job<F>(&self, name: impl Into<String>, work: F) -> JobBuilder<'_, F> {
        JobBuilder::new(&self.shared, name.into(), work)
    }
}

impl Submitter {
    /// Same as [`JobSystem::submit`]. After the system shut down, the
    /// returned handle is already finished with `JobError::Shutdown`.
    pub fn submit<T, F>(
        &self,
        name: impl Into<String>,
        priority: Priority,
        pool: PoolId,
        dependencies: &[Dependency],
        work: F,
    ) -> Handle<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, JobError> + Send + 'static,
    {
        self.shared.submit(name.into(), priority, pool, dependencies, work)
    }

    pub fn job<F>(&self, name: impl Into<String>, work: F) -> JobBuilder<'_, F> {
        JobBuilder::new(&self.shared, name.into(), work)
    }
}

/// Fluent alternative to the five-argument `submit`.
///
/// ```no_run
/// # use jobweave_scheduler::{JobSystem, PoolId, Priority, SchedulerConfig};
/// # let system = JobSystem::new(SchedulerConfig::default()).unwrap();
/// let mesh = system.job("load-mesh", || Ok(vec![0u8; 16])).pool(PoolId::Io).submit();
/// let upload = system
///     .job("upload", || Ok(()))
///     .pool(PoolId::Render)
///     .priority(Priority::High)
///     .after(&mesh)
///     .submit();
/// ```
#[must_use = "a job is only queued once `submit` is called"]
pub struct JobBuilder<'a, F> {
    shared: &'a SystemShared,
    name: String,
    priority: Priority,
    pool: PoolId,
    dependencies: Vec<Dependency>,
    work: F,
}

impl<'a, F> JobBuilder<'a, F> {
    fn new(shared: &'a SystemShared, name: String, work: F) -> Self {
        Self {
            shared,
            name,
            priority: Priority::default(),
            pool: PoolId::default(),
            dependencies: Vec::new(),
            work,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn pool(mut self, pool: PoolId) -> Self {
        self.pool = pool;
        self
    }

    pub fn after(mut self, dependency: impl Into<Dependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn after_all<I>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Dependency>,
    {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn submit<T>(self) -> Handle<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, JobError> + Send + 'static,
    {
        self.shared
            .submit(self.name, self.priority, self.pool, &self.dependencies, self.work)
    }
}
