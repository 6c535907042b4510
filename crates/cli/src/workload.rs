use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::info;

use jobweave_scheduler::{Handle, JobError, JobSystem, PoolId, Priority};

/// Outcome of one `jobweave run`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub fan_out_jobs: usize,
    pub fan_out_counted: usize,
    pub chain_length: usize,
    pub chain_result: usize,
    pub elapsed: Duration,
}

/// Submit `jobs` independent counter jobs on the general pool plus a
/// collector that runs after all of them, and check the count.
pub fn fan_out(system: &JobSystem, jobs: usize) -> Result<usize> {
    let counter = Arc::new(AtomicUsize::new(0));
    let handles: Vec<Handle<()>> = (0..jobs)
        .map(|i| {
            let counter = Arc::clone(&counter);
            system.submit(format!("count-{i}"), Priority::Normal, PoolId::General, &[], move || {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
        })
        .collect();

    let total = Arc::clone(&counter);
    let collector = system
        .job("collect", move || Ok(total.load(Ordering::Acquire)))
        .priority(Priority::High)
        .after_all(&handles)
        .submit();

    let counted = collector.wait()?;
    if counted != jobs {
        bail!("fan-out counted {counted} of {jobs} jobs");
    }
    Ok(counted)
}

/// Build a chain of `length` jobs, each on the next pool in turn, where every
/// link adds one to its predecessor's value.
pub fn chain(system: &JobSystem, length: usize) -> Result<usize> {
    let mut previous: Option<Handle<usize>> = None;
    for link in 0..length {
        let pool = PoolId::ALL[link % PoolId::ALL.len()];
        let upstream = previous.clone();
        let mut builder = system
            .job(format!("chain-{link}"), move || {
                let base = match &upstream {
                    Some(handle) => handle.wait()?,
                    None => 0,
                };
                Ok::<_, JobError>(base + 1)
            })
            .pool(pool);
        if let Some(handle) = &previous {
            builder = builder.after(handle);
        }
        previous = Some(builder.submit());
    }

    let result = match previous {
        Some(last) => last.wait()?,
        None => 0,
    };
    if result != length {
        bail!("chain produced {result}, expected {length}");
    }
    Ok(result)
}

pub fn run(system: &JobSystem, jobs: usize, chain_length: usize) -> Result<RunSummary> {
    let started = Instant::now();
    let fan_out_counted = fan_out(system, jobs)?;
    let chain_result = chain(system, chain_length)?;
    let elapsed = started.elapsed();

    info!(jobs, chain = chain_length, ?elapsed, "workload finished");
    Ok(RunSummary {
        fan_out_jobs: jobs,
        fan_out_counted,
        chain_length,
        chain_result,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use jobweave_scheduler::SchedulerConfig;

    use super::*;

    fn system() -> JobSystem {
        JobSystem::new(SchedulerConfig::uniform(2).without_watchdog()).unwrap()
    }

    #[test]
    fn fan_out_counts_every_job() {
        assert_eq!(fan_out(&system(), 200).unwrap(), 200);
    }

    #[test]
    fn chain_visits_every_pool() {
        let system = system();
        assert_eq!(chain(&system, 9).unwrap(), 9);
        let metrics = system.metrics();
        for pool in PoolId::ALL {
            assert!(metrics.pool(pool).jobs_completed >= 2);
        }
    }

    #[test]
    fn empty_workload() {
        let summary = run(&system(), 0, 0).unwrap();
        assert_eq!(summary.fan_out_counted, 0);
        assert_eq!(summary.chain_result, 0);
    }
}
