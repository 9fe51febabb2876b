//! Live counters for worker pool units.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct UnitCounters {
    live: AtomicUsize,
    peak: AtomicUsize,
    spawned: AtomicUsize,
}

/// Shared view of how many pool units are running.
///
/// Clone it into a [`WorkerPool`](super::WorkerPool) and read it afterwards:
/// once a batch call has returned, `live_units()` is zero.
#[derive(Debug, Clone, Default)]
pub struct PoolMonitor {
    counters: Arc<UnitCounters>,
}

impl PoolMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units currently running
    pub fn live_units(&self) -> usize {
        self.counters.live.load(Ordering::Acquire)
    }

    /// Highest number of units seen running at the same time
    pub fn peak_units(&self) -> usize {
        self.counters.peak.load(Ordering::Acquire)
    }

    /// Units started over the monitor's lifetime
    pub fn spawned_units(&self) -> usize {
        self.counters.spawned.load(Ordering::Acquire)
    }

    /// Marks a unit as running until the returned guard drops
    pub(crate) fn enter(&self) -> UnitGuard {
        let live = self.counters.live.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.peak.fetch_max(live, Ordering::AcqRel);
        self.counters.spawned.fetch_add(1, Ordering::AcqRel);
        UnitGuard {
            counters: Arc::clone(&self.counters),
        }
    }
}

pub(crate) struct UnitGuard {
    counters: Arc<UnitCounters>,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::AcqRel);
    }
}
