use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Job priority within a pool. Higher variants are picked first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        };
        f.write_str(name)
    }
}

/// The worker pools a job system is built from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PoolId {
    /// Catch-all compute work.
    #[default]
    General,
    /// Blocking file and network work.
    Io,
    Render,
    Simulation,
}

impl PoolId {
    /// Every pool, in construction and teardown order.
    pub const ALL: [PoolId; 4] = [PoolId::General, PoolId::Io, PoolId::Render, PoolId::Simulation];

    pub fn as_str(self) -> &'static str {
        match self {
            PoolId::General => "general",
            PoolId::Io => "io",
            PoolId::Render => "render",
            PoolId::Simulation => "simulation",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolId {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PoolId::ALL
            .into_iter()
            .find(|pool| pool.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SchedulerError::Config(format!("unknown pool '{s}'")))
    }
}

/// Process-unique job ticket. Ids increase with submission order, which makes
/// them the FIFO tie-breaker between jobs of equal priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(u64);

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

impl JobId {
    pub(crate) fn next() -> Self {
        JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coarse lifecycle state, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Finished,
}
