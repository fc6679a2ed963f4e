//! Bounded admission in front of the merge semaphore.
//!
//! At most `max_concurrent + max_queued` jobs are admitted at once. Admitted
//! jobs wait for one of `max_concurrent` merge permits; anything beyond the
//! bound is turned away immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::metrics;

/// Admission counter plus the merge semaphore.
#[derive(Debug, Clone)]
pub struct JobGate {
    slots: Arc<Semaphore>,
    admitted: Arc<AtomicUsize>,
    capacity: usize,
}

impl JobGate {
    pub fn new(max_concurrent: usize, max_queued: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            admitted: Arc::new(AtomicUsize::new(0)),
            capacity: max_concurrent + max_queued,
        }
    }

    /// Admit a job, or `None` when running plus waiting jobs are at capacity.
    pub fn try_admit(&self) -> Option<Admission> {
        let previous = self
            .admitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .ok()?;
        metrics::set_jobs_admitted(previous + 1);

        Some(Admission {
            slots: Arc::clone(&self.slots),
            admitted: Arc::clone(&self.admitted),
        })
    }

    /// Jobs currently admitted (running or waiting).
    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A job's place in line. Releases its slot when dropped.
#[derive(Debug)]
pub struct Admission {
    slots: Arc<Semaphore>,
    admitted: Arc<AtomicUsize>,
}

impl Admission {
    /// Wait for a merge permit.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        Arc::clone(&self.slots).acquire_owned().await
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        let previous = self.admitted.fetch_sub(1, Ordering::SeqCst);
        metrics::set_jobs_admitted(previous.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    #[test]
    fn test_rejects_beyond_capacity() {
        let gate = JobGate::new(1, 1);
        let first = gate.try_admit().unwrap();
        let _second = gate.try_admit().unwrap();
        assert!(gate.try_admit().is_none());

        drop(first);
        assert!(gate.try_admit().is_some());
    }

    #[test]
    fn test_permits_bound_concurrency() {
        let gate = JobGate::new(1, 2);
        let a = gate.try_admit().unwrap();
        let b = gate.try_admit().unwrap();

        let mut first = task::spawn(a.acquire());
        let permit = assert_ready_ok!(first.poll());

        let mut second = task::spawn(b.acquire());
        assert_pending!(second.poll());

        drop(permit);
        assert!(second.is_woken());
        assert_ready_ok!(second.poll());
        assert_eq!(gate.admitted(), 2);
    }
}
