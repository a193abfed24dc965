use std::sync::{Condvar, Mutex, PoisonError};

/// Parking spot for threads that arrive while the buffer is mid-expansion.
///
/// A mutex-protected condition variable with broadcast wake. The predicate is
/// evaluated under the lock and the expander takes the lock to broadcast, so
/// a thread that saw the predicate hold cannot miss the wake that follows.
/// Spurious wakeups cost one extra predicate check.
pub(crate) struct Gate {
    lock: Mutex<()>,
    parked: Condvar,
}

impl Gate {
    pub(crate) const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            parked: Condvar::new(),
        }
    }

    /// Parks the caller for as long as `blocked()` holds.
    pub(crate) fn wait_while<F>(&self, mut blocked: F)
    where
        F: FnMut() -> bool,
    {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while blocked() {
            guard = self
                .parked
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wakes every parked thread.
    pub(crate) fn open(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.parked.notify_all();
    }
}
