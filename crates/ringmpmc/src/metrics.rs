use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe traffic counters.
///
/// Updated only when [`Config::enable_metrics`](crate::Config) is set; the
/// counters are relaxed atomics, so a snapshot taken under load is
/// approximate across fields but exact per field.
#[derive(Debug, Default)]
pub struct Metrics {
    batches_pushed: AtomicU64,
    batches_popped: AtomicU64,
    elements_pushed: AtomicU64,
    elements_popped: AtomicU64,
    expansions: AtomicU64,
    pop_timeouts: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_push(&self, elements: u64) {
        self.batches_pushed.fetch_add(1, Ordering::Relaxed);
        self.elements_pushed.fetch_add(elements, Ordering::Relaxed);
    }

    pub(crate) fn add_pop(&self, elements: u64) {
        self.batches_popped.fetch_add(1, Ordering::Relaxed);
        self.elements_popped.fetch_add(elements, Ordering::Relaxed);
    }

    pub(crate) fn add_expansion(&self) {
        self.expansions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_pop_timeout(&self) {
        self.pop_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the counters out at one instant.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_pushed: self.batches_pushed.load(Ordering::Relaxed),
            batches_popped: self.batches_popped.load(Ordering::Relaxed),
            elements_pushed: self.elements_pushed.load(Ordering::Relaxed),
            elements_popped: self.elements_popped.load(Ordering::Relaxed),
            expansions: self.expansions.load(Ordering::Relaxed),
            pop_timeouts: self.pop_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Plain-data view of [`Metrics`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_pushed: u64,
    pub batches_popped: u64,
    pub elements_pushed: u64,
    pub elements_popped: u64,
    pub expansions: u64,
    pub pop_timeouts: u64,
}
