use std::fmt::Display;

use thiserror::Error;

/// Why a job finished without producing a value.
///
/// Stored in the job's outcome slot and handed back (cloned) by every
/// `Handle::wait` call, so it has to be `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The work returned an error.
    #[error("job failed: {0}")]
    Failed(String),

    /// The work panicked. The worker caught the panic and kept running.
    #[error("job panicked: {0}")]
    Panicked(String),

    /// The job was still pending when its pool stopped.
    #[error("scheduler shut down before the job ran")]
    Shutdown,
}

impl JobError {
    pub fn failed(reason: impl Display) -> Self {
        JobError::Failed(reason.to_string())
    }

    /// True when the work itself ran and went wrong, as opposed to never
    /// running because of shutdown.
    pub fn is_work_failure(&self) -> bool {
        matches!(self, JobError::Failed(_) | JobError::Panicked(_))
    }
}

impl From<String> for JobError {
    fn from(reason: String) -> Self {
        JobError::Failed(reason)
    }
}

impl From<&str> for JobError {
    fn from(reason: &str) -> Self {
        JobError::Failed(reason.to_string())
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        JobError::Failed(format!("{err:#}"))
    }
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        JobError::Failed(err.to_string())
    }
}

/// Errors raised while building or configuring the job system.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to spawn thread {thread}: {source}")]
    ThreadSpawn {
        thread: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_failures_are_distinguished_from_shutdown() {
        assert!(JobError::failed("boom").is_work_failure());
        assert!(JobError::Panicked("oops".into()).is_work_failure());
        assert!(!JobError::Shutdown.is_work_failure());
    }

    #[test]
    fn conversions_produce_failed() {
        assert_eq!(JobError::from("bad input"), JobError::Failed("bad input".into()));

        let err = anyhow::anyhow!("disk full").context("writing chunk");
        assert_eq!(JobError::from(err), JobError::Failed("writing chunk: disk full".into()));
    }

    #[test]
    fn display_messages() {
        assert_eq!(JobError::failed(42).to_string(), "job failed: 42");
        assert_eq!(
            JobError::Shutdown.to_string(),
            "scheduler shut down before the job ran"
        );
    }
}
