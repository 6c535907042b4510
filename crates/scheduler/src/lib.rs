//! Multi-pool, dependency-aware job scheduler.
//!
//! Jobs are closures submitted to one of a fixed set of worker pools
//! ([`PoolId`]) with a [`Priority`] and a list of [`Dependency`] references to
//! earlier jobs. A job runs only after every live dependency finished. Each
//! submission returns a typed [`Handle`] for awaiting the result.
//!
//! ```no_run
//! use jobweave_scheduler::{JobError, JobSystem, PoolId, Priority, SchedulerConfig};
//!
//! let system = JobSystem::new(SchedulerConfig::default())?;
//! let a = system.submit("load", Priority::High, PoolId::Io, &[], || Ok(10));
//! let a2 = a.clone();
//! let b = system
//!     .job("double", move || Ok(a2.wait()? * 2))
//!     .after(&a)
//!     .submit();
//! assert_eq!(b.wait(), Ok(20));
//! # Ok::<(), jobweave_scheduler::SchedulerError>(())
//! ```

pub mod config;
pub mod error;
pub mod handle;
mod job;
pub mod metrics;
pub mod pool;
pub mod system;
pub mod types;

pub use config::{PoolConfig, PoolSettings, SchedulerConfig};
pub use error::{JobError, SchedulerError};
pub use handle::{Dependency, Handle};
pub use metrics::{PoolMetrics, SchedulerMetrics};
pub use pool::WorkerPool;
pub use system::{Blocker, BlockerState, JobBuilder, JobSystem, StarvationReport, Submitter};
pub use types::{JobId, JobState, PoolId, Priority};

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Job bodies run outside every lock and panics inside them are caught, so
/// poisoning here only follows a bug in the scheduler itself.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`lock`] for the shared metrics.
pub(crate) fn write<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rwlock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rwlock.read().unwrap_or_else(PoisonError::into_inner)
}
