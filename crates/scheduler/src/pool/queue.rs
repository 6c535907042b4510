use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::job::Job;
use crate::types::{JobId, Priority};

/// Highest priority first, then lowest id (earliest submission).
type QueueKey = (Reverse<Priority>, JobId);

/// A pool's pending jobs, in pick order.
///
/// Not synchronized; the pool keeps it behind its queue mutex.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    jobs: BTreeMap<QueueKey, Arc<Job>>,
}

impl PendingQueue {
    pub(crate) fn push(&mut self, job: Arc<Job>) {
        self.jobs.insert((Reverse(job.priority()), job.id()), job);
    }

    /// Remove and return the first job, in pick order, whose dependencies are
    /// satisfied. Blocked jobs stay queued in place.
    pub(crate) fn take_ready(&mut self) -> Option<Arc<Job>> {
        let key = self
            .jobs
            .iter()
            .find(|(_, job)| job.dependencies_satisfied())
            .map(|(key, _)| *key)?;
        self.jobs.remove(&key)
    }

    /// Empty the queue, returning the jobs in pick order.
    pub(crate) fn drain(&mut self) -> Vec<Arc<Job>> {
        std::mem::take(&mut self.jobs).into_values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::tests::value_job;

    fn names(jobs: &[Arc<Job>]) -> Vec<&str> {
        jobs.iter().map(|j| j.name()).collect()
    }

    #[test]
    fn priority_then_fifo() {
        let mut q = PendingQueue::default();
        q.push(value_job("low", Priority::Low, &[], 0));
        q.push(value_job("normal-1", Priority::Normal, &[], 0));
        q.push(value_job("high", Priority::High, &[], 0));
        q.push(value_job("normal-2", Priority::Normal, &[], 0));

        let mut order = Vec::new();
        while let Some(job) = q.take_ready() {
            order.push(job);
        }
        assert_eq!(names(&order), vec!["high", "normal-1", "normal-2", "low"]);
        assert!(q.is_empty());
    }

    #[test]
    fn blocked_job_is_skipped_not_removed() {
        let gate = value_job("gate", Priority::Low, &[], 0);
        let mut q = PendingQueue::default();
        q.push(value_job("blocked", Priority::High, &[&gate], 0));
        q.push(value_job("free", Priority::Low, &[], 0));

        assert_eq!(q.take_ready().unwrap().name(), "free");
        assert!(q.take_ready().is_none());
        assert_eq!(q.len(), 1);

        gate.run();
        assert_eq!(q.take_ready().unwrap().name(), "blocked");
    }

    #[test]
    fn drain_empties_in_pick_order() {
        let mut q = PendingQueue::default();
        q.push(value_job("b", Priority::Low, &[], 0));
        q.push(value_job("a", Priority::High, &[], 0));

        let drained = q.drain();
        assert_eq!(names(&drained), vec!["a", "b"]);
        assert_eq!(q.len(), 0);
    }
}
