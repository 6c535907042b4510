use tracing::{debug, warn};

use crate::types::PoolId;

/// Core that worker `index` should run on, round-robin over `cores`.
pub(crate) fn core_for_worker(cores: &[usize], index: usize) -> Option<usize> {
    if cores.is_empty() {
        None
    } else {
        Some(cores[index % cores.len()])
    }
}

/// Pin the calling thread to its configured core.
///
/// Pinning is a hint. Platforms without affinity support and cores missing
/// from this machine only produce a warning.
pub(crate) fn pin_current_thread(pool: PoolId, index: usize, cores: &[usize]) {
    let Some(wanted) = core_for_worker(cores, index) else {
        return;
    };

    let Some(available) = core_affinity::get_core_ids() else {
        warn!(%pool, worker = index, core = wanted, "thread affinity not supported, running unpinned");
        return;
    };

    match available.into_iter().find(|core| core.id == wanted) {
        Some(core) if core_affinity::set_for_current(core) => {
            debug!(%pool, worker = index, core = wanted, "worker pinned");
        }
        Some(_) => {
            warn!(%pool, worker = index, core = wanted, "failed to pin worker, running unpinned");
        }
        None => {
            warn!(%pool, worker = index, core = wanted, "core not present on this machine, running unpinned");
        }
    }
}
