use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::types::PoolId;

// ── Top-level config ────────────────────────────────────────────────

/// Job system configuration, typically parsed from `jobweave.toml`.
///
/// Pools without a `[pools.<name>]` section fall back to built-in thread
/// counts (see [`SchedulerConfig::resolved_threads`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the watchdog looks for starved jobs, in milliseconds.
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,

    #[serde(default = "default_watchdog_enabled")]
    pub watchdog_enabled: bool,

    /// Idle back-off between queue scans when nothing queued is ready, in
    /// microseconds.
    #[serde(default = "default_rescan_interval_us")]
    pub rescan_interval_us: u64,

    #[serde(default)]
    pub pools: BTreeMap<PoolId, PoolConfig>,
}

/// One `[pools.<name>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Worker thread count. `None` = pool default.
    #[serde(default)]
    pub threads: Option<usize>,

    /// CPU cores to pin workers to, assigned round-robin. Empty = no pinning.
    #[serde(default)]
    pub cores: Vec<usize>,
}

fn default_watchdog_interval_ms() -> u64 {
    2000
}

fn default_watchdog_enabled() -> bool {
    true
}

fn default_rescan_interval_us() -> u64 {
    500
}

fn default_threads(pool: PoolId) -> usize {
    match pool {
        PoolId::General => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4),
        PoolId::Io => 2,
        PoolId::Render | PoolId::Simulation => 1,
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_ms: default_watchdog_interval_ms(),
            watchdog_enabled: default_watchdog_enabled(),
            rescan_interval_us: default_rescan_interval_us(),
            pools: BTreeMap::new(),
        }
    }
}

/// What a single pool needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub threads: usize,
    pub cores: Vec<usize>,
    pub rescan_interval: Duration,
}

// ── Loading & Validation ────────────────────────────────────────────

impl SchedulerConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Every pool gets `threads` workers. Handy for tests.
    pub fn uniform(threads: usize) -> Self {
        PoolId::ALL
            .into_iter()
            .fold(Self::default(), |config, pool| config.with_threads(pool, threads))
    }

    pub fn with_threads(mut self, pool: PoolId, threads: usize) -> Self {
        self.pools.entry(pool).or_default().threads = Some(threads);
        self
    }

    pub fn with_cores(mut self, pool: PoolId, cores: Vec<usize>) -> Self {
        self.pools.entry(pool).or_default().cores = cores;
        self
    }

    /// Rounded up to whole milliseconds, so any non-zero interval stays valid.
    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        let millis = interval.as_nanos().div_ceil(1_000_000);
        self.watchdog_interval_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    pub fn without_watchdog(mut self) -> Self {
        self.watchdog_enabled = false;
        self
    }

    /// Thread count for `pool`, falling back to the pool default.
    ///
    /// `general` defaults to the available parallelism, `io` to 2, `render`
    /// and `simulation` to 1.
    pub fn resolved_threads(&self, pool: PoolId) -> usize {
        self.pools
            .get(&pool)
            .and_then(|p| p.threads)
            .unwrap_or_else(|| default_threads(pool))
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_micros(self.rescan_interval_us)
    }

    pub fn pool_settings(&self, pool: PoolId) -> PoolSettings {
        PoolSettings {
            threads: self.resolved_threads(pool),
            cores: self
                .pools
                .get(&pool)
                .map(|p| p.cores.clone())
                .unwrap_or_default(),
            rescan_interval: self.rescan_interval(),
        }
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// - `JOBWEAVE_WATCHDOG_INTERVAL_MS` → `watchdog_interval_ms`
    /// - `JOBWEAVE_WATCHDOG_ENABLED` → `watchdog_enabled`
    /// - `JOBWEAVE_RESCAN_INTERVAL_US` → `rescan_interval_us`
    /// - `JOBWEAVE_<POOL>_THREADS` → `pools.<pool>.threads`
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(ms) = lookup("JOBWEAVE_WATCHDOG_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.watchdog_interval_ms = ms;
        }
        if let Some(enabled) = lookup("JOBWEAVE_WATCHDOG_ENABLED").and_then(|v| parse_bool(&v)) {
            self.watchdog_enabled = enabled;
        }
        if let Some(us) = lookup("JOBWEAVE_RESCAN_INTERVAL_US").and_then(|v| v.parse().ok()) {
            self.rescan_interval_us = us;
        }
        for pool in PoolId::ALL {
            let key = format!("JOBWEAVE_{}_THREADS", pool.as_str().to_ascii_uppercase());
            if let Some(threads) = lookup(&key).and_then(|v| v.parse().ok()) {
                self.pools.entry(pool).or_default().threads = Some(threads);
            }
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.watchdog_interval_ms == 0 {
            return Err(SchedulerError::Config(
                "watchdog_interval_ms must be greater than zero".into(),
            ));
        }
        if self.rescan_interval_us == 0 {
            return Err(SchedulerError::Config(
                "rescan_interval_us must be greater than zero".into(),
            ));
        }
        for (pool, section) in &self.pools {
            Self::validate_pool(*pool, section)?;
        }
        Ok(())
    }

    fn validate_pool(pool: PoolId, section: &PoolConfig) -> Result<(), SchedulerError> {
        if section.threads == Some(0) {
            return Err(SchedulerError::Config(format!(
                "pool '{pool}' must have at least one thread"
            )));
        }
        let mut seen = HashSet::new();
        for core in &section.cores {
            if !seen.insert(core) {
                return Err(SchedulerError::Config(format!(
                    "pool '{pool}' lists core {core} more than once"
                )));
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
