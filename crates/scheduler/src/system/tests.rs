#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::config::SchedulerConfig;
    use crate::error::JobError;
    use crate::handle::{Dependency, Handle};
    use crate::job::tests::value_job;
    use crate::system::{BlockerState, JobSystem};
    use crate::types::{JobState, PoolId, Priority};

    fn quiet_system(threads: usize) -> JobSystem {
        JobSystem::new(SchedulerConfig::uniform(threads).without_watchdog()).unwrap()
    }

    /// A job on `pool` that signals once running and then blocks until
    /// `release` receives a message (or its sender is dropped).
    fn gate(system: &JobSystem, pool: PoolId) -> (Handle<()>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = system.submit("gate", Priority::Normal, pool, &[], move || {
            started_tx.send(()).ok();
            release_rx.recv().ok();
            Ok(())
        });
        started_rx.recv().unwrap();
        (handle, release_tx)
    }

    #[test]
    fn system_creation() {
        let system = JobSystem::new(
            SchedulerConfig::default()
                .with_threads(PoolId::General, 2)
                .without_watchdog(),
        )
        .unwrap();

        assert_eq!(system.thread_count(PoolId::General), 2);
        assert_eq!(system.thread_count(PoolId::Io), 2);
        assert_eq!(system.in_flight(), 0);

        let metrics = system.metrics();
        assert_eq!(metrics.pools.len(), 4);
        assert_eq!(metrics.pool(PoolId::Render).threads, 1);
        assert_eq!(metrics.watchdog_scans, 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = JobSystem::new(SchedulerConfig::default().with_threads(PoolId::Io, 0))
            .err()
            .unwrap();
        assert!(err.to_string().contains("io"));
    }

    #[test]
    fn submit_and_wait() {
        let system = quiet_system(2);
        let handle = system.submit("answer", Priority::High, PoolId::Simulation, &[], || Ok(42u64));
        assert_eq!(handle.wait(), Ok(42));
        assert_eq!(handle.pool(), PoolId::Simulation);
        assert_eq!(handle.state(), JobState::Finished);

        let metrics = system.metrics();
        assert_eq!(metrics.pool(PoolId::Simulation).jobs_submitted, 1);
        assert_eq!(metrics.pool(PoolId::Simulation).jobs_completed, 1);
    }

    #[test]
    fn builder_defaults_and_dependencies() {
        let system = quiet_system(2);
        let a = system.job("a", || Ok(3)).submit();
        assert_eq!(a.priority(), Priority::Normal);
        assert_eq!(a.pool(), PoolId::General);

        let a2 = a.clone();
        let b = system
            .job("b", move || Ok(a2.wait()? + 1))
            .pool(PoolId::Io)
            .priority(Priority::Low)
            .after(&a)
            .submit();
        let deps = vec![a.dependency(), b.dependency()];
        let c = system.job("c", || Ok("done")).after_all(&deps).submit();

        assert_eq!(b.wait(), Ok(4));
        assert_eq!(c.wait(), Ok("done"));
        assert!(a.is_finished());
    }

    #[test]
    fn dependency_on_a_freed_job_is_satisfied() {
        let system = quiet_system(1);
        let orphan = value_job("orphan", Priority::Normal, &[], 0);
        let dep = Dependency(Arc::downgrade(&orphan));

        let blocked = system.submit("blocked", Priority::Normal, PoolId::General, &[dep], || Ok(1));
        assert_eq!(blocked.wait_timeout(Duration::from_millis(20)), None);

        // The orphan never runs; freeing it releases the dependent.
        drop(orphan);
        assert_eq!(blocked.wait(), Ok(1));
    }

    #[test]
    fn shutdown_fails_blocked_jobs() {
        let system = quiet_system(2);
        let orphan = value_job("orphan", Priority::Normal, &[], 0);
        let dep = Dependency(Arc::downgrade(&orphan));

        let ran = Arc::new(AtomicUsize::new(0));
        let handles: Vec<Handle<()>> = PoolId::ALL
            .into_iter()
            .map(|pool| {
                let ran = Arc::clone(&ran);
                system.submit("blocked", Priority::High, pool, &[dep.clone()], move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        let started = Instant::now();
        system.shutdown();
        assert!(started.elapsed() < Duration::from_secs(5));

        for handle in &handles {
            assert_eq!(handle.wait(), Err(JobError::Shutdown));
            assert!(handle.is_finished());
        }
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        drop(orphan);
    }

    #[test]
    fn pinned_pool_runs_jobs() {
        let system = JobSystem::new(
            SchedulerConfig::default()
                .with_threads(PoolId::General, 2)
                .with_cores(PoolId::General, vec![0])
                .without_watchdog(),
        )
        .unwrap();
        assert_eq!(system.config().pool_settings(PoolId::General).cores, vec![0]);

        let handles: Vec<Handle<Option<String>>> = (0..8)
            .map(|i| {
                system.submit(format!("pinned-{i}"), Priority::Normal, PoolId::General, &[], || {
                    Ok(thread::current().name().map(str::to_string))
                })
            })
            .collect();
        for handle in &handles {
            let name = handle.wait().unwrap().unwrap();
            assert!(name.starts_with("jobweave-general-"), "{name}");
        }
        assert_eq!(system.metrics().pool(PoolId::General).jobs_completed, 8);
    }

    #[test]
    fn stop_request_fails_queued_jobs_before_join() {
        let system = quiet_system(1);
        let orphan = value_job("orphan", Priority::Normal, &[], 0);
        let dep = Dependency(Arc::downgrade(&orphan));
        let blocked = system.submit("blocked", Priority::Normal, PoolId::Simulation, &[dep], || Ok(1));

        // Stopping without joining already fails the queued job.
        system.pools[PoolId::Simulation.index()].request_stop();
        assert_eq!(blocked.wait_timeout(Duration::from_secs(5)), Some(Err(JobError::Shutdown)));
        assert_eq!(system.queue_depth(PoolId::Simulation), 0);
        assert_eq!(system.metrics().pool(PoolId::Simulation).jobs_discarded, 1);

        system.shutdown();
        drop(orphan);
    }

    #[test]
    fn submitter_outliving_system_gets_shutdown() {
        let system = quiet_system(1);
        let submitter = system.submitter();
        drop(system);

        let late = submitter.submit("late", Priority::High, PoolId::Io, &[], || Ok(1));
        assert!(late.is_finished());
        assert_eq!(late.wait(), Err(JobError::Shutdown));
    }

    #[test]
    fn in_flight_counts_unfinished_jobs() {
        let system = quiet_system(1);
        let (gate, release) = gate(&system, PoolId::General);
        let waiting = system.job("waiting", || Ok(())).after(&gate).submit();

        assert_eq!(system.in_flight(), 2);
        assert_eq!(system.queue_depth(PoolId::General), 1);

        release.send(()).unwrap();
        waiting.wait().unwrap();
        assert_eq!(system.in_flight(), 0);
        assert_eq!(system.queue_depth(PoolId::General), 0);
    }

    #[test]
    fn starvation_scan_names_root_blocker() {
        let system = quiet_system(1);
        let (gate, release) = gate(&system, PoolId::General);
        let mid = system.job("mid", || Ok(())).pool(PoolId::Io).after(&gate).submit();
        let leaf = system
            .job("leaf", || Ok(()))
            .pool(PoolId::Render)
            .after(&mid)
            .submit();

        thread::sleep(Duration::from_millis(30));
        let mut reports = system.scan_for_starvation(Duration::from_millis(10));
        reports.sort_by_key(|r| r.job);
        assert_eq!(reports.len(), 2, "{reports:?}");

        let (mid_report, leaf_report) = (&reports[0], &reports[1]);
        assert_eq!(mid_report.job, mid.id());
        assert_eq!(mid_report.blockers.len(), 1);
        assert_eq!(mid_report.blockers[0].job, gate.id());
        assert_eq!(mid_report.blockers[0].state, BlockerState::Running);

        assert_eq!(leaf_report.job, leaf.id());
        assert_eq!(leaf_report.pool, PoolId::Render);
        assert_eq!(leaf_report.blockers[0].job, mid.id());
        assert_eq!(leaf_report.blockers[0].state, BlockerState::Blocked);
        assert_eq!(leaf_report.root_blockers.len(), 1);
        assert_eq!(leaf_report.root_blockers[0].job, gate.id());
        assert!(leaf_report.waited >= Duration::from_millis(10));

        // Jobs younger than the threshold are not reported.
        assert!(system.scan_for_starvation(Duration::from_secs(60)).is_empty());

        release.send(()).unwrap();
        leaf.wait().unwrap();
        assert!(system.scan_for_starvation(Duration::ZERO).is_empty());
    }

    #[test]
    fn queued_behind_work_is_not_starvation() {
        let system = quiet_system(1);
        let (_gate, release) = gate(&system, PoolId::General);
        let queued = system.job("queued", || Ok(())).submit();

        thread::sleep(Duration::from_millis(20));
        assert!(system.scan_for_starvation(Duration::ZERO).is_empty());

        release.send(()).unwrap();
        queued.wait().unwrap();
    }

    #[test]
    fn watchdog_thread_records_stalls() {
        let system = JobSystem::new(
            SchedulerConfig::uniform(1).with_watchdog_interval(Duration::from_millis(20)),
        )
        .unwrap();
        let (gate, release) = gate(&system, PoolId::General);
        let stalled = system.job("stalled", || Ok(())).pool(PoolId::Io).after(&gate).submit();

        let deadline = Instant::now() + Duration::from_secs(5);
        while system.metrics().stalls_reported == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        let metrics = system.metrics();
        assert!(metrics.watchdog_scans >= 1);
        assert!(metrics.stalls_reported >= 1);

        release.send(()).unwrap();
        stalled.wait().unwrap();
    }

    #[test]
    fn panics_and_failures_are_counted() {
        let system = quiet_system(1);
        let bad = system.submit("bad", Priority::Normal, PoolId::General, &[], || {
            Err::<(), _>(JobError::failed("no input"))
        });
        let boom = system.submit("boom", Priority::Normal, PoolId::General, &[], || -> Result<(), JobError> {
            panic!("exploded")
        });
        let fine = system.submit("fine", Priority::Normal, PoolId::General, &[], || Ok(1));

        assert_eq!(bad.wait(), Err(JobError::Failed("no input".into())));
        assert_eq!(boom.wait(), Err(JobError::Panicked("exploded".into())));
        assert_eq!(fine.wait(), Ok(1));

        let general = system.metrics().pool(PoolId::General);
        assert_eq!(general.jobs_failed, 1);
        assert_eq!(general.jobs_panicked, 1);
        assert_eq!(general.jobs_completed, 1);
    }
}
