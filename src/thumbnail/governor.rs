//! Process-wide cap on running thumbnail workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Workers allowed for `logical_cores`: leave two cores free, but always
/// allow at least two workers.
pub fn worker_limit(logical_cores: usize) -> usize {
    logical_cores.saturating_sub(2).max(2)
}

/// Counts running workers against a fixed limit.
///
/// Clones share the same counter. Starts at zero and needs no teardown:
/// every admitted worker holds a [`WorkerPermit`] that gives its slot back
/// when dropped.
#[derive(Debug, Clone)]
pub struct WorkerGovernor {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    running: AtomicUsize,
    limit: usize,
}

impl WorkerGovernor {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                running: AtomicUsize::new(0),
                limit,
            }),
        }
    }

    /// Governor sized by [`worker_limit`].
    pub fn for_cores(logical_cores: usize) -> Self {
        Self::new(worker_limit(logical_cores))
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Claim a worker slot, or `None` when the limit is reached.
    pub fn try_admit(&self) -> Option<WorkerPermit> {
        let admitted = self
            .inner
            .running
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.inner.limit).then_some(n + 1)
            })
            .is_ok();
        admitted.then(|| WorkerPermit {
            inner: Arc::clone(&self.inner),
        })
    }
}

/// One admitted worker's slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct WorkerPermit {
    inner: Arc<Inner>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.inner.running.fetch_sub(1, Ordering::AcqRel);
    }
}
