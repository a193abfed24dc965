use crate::{Config, MetricsSnapshot, Ring, RingError, RingState};
use std::fmt;
use std::sync::Arc;

/// Cloneable handle to a shared [`Ring`].
///
/// Every clone refers to the same buffer. Producers and consumers are just
/// threads calling [`push`](Queue::push) and [`pop`](Queue::pop) on their
/// own handle; there is no registration step.
///
/// # Example
///
/// ```
/// use ringmpmc::Queue;
///
/// let queue = Queue::<u64>::with_capacity(16);
/// queue.push(&[1, 2, 3]).unwrap();
///
/// let mut out = [0u64; 3];
/// let taken = queue.pop(&mut out).unwrap();
/// assert_eq!(&out[..taken], &[1, 2, 3]);
/// ```
pub struct Queue<T> {
    inner: Arc<Ring<T>>,
}

impl<T: Copy + Default> Queue<T> {
    /// Creates a queue from a full configuration.
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(Ring::new(config)),
        }
    }

    /// Queue with the given starting capacity and default tuning.
    pub fn with_capacity(capacity: u32) -> Self {
        Self::new(Config::new(capacity))
    }

    /// Enqueues all of `src` as one contiguous batch. See [`Ring::push`].
    #[inline]
    pub fn push(&self, src: &[T]) -> Result<usize, RingError> {
        self.inner.push(src)
    }

    /// Non-parking push. See [`Ring::try_push`].
    #[inline]
    pub fn try_push(&self, src: &[T]) -> Result<usize, RingError> {
        self.inner.try_push(src)
    }

    /// Dequeues up to `dst.len()` elements. See [`Ring::pop`].
    #[inline]
    pub fn pop(&self, dst: &mut [T]) -> Result<usize, RingError> {
        self.inner.pop(dst)
    }

    /// Single non-blocking dequeue attempt. See [`Ring::try_pop`].
    #[inline]
    pub fn try_pop(&self, dst: &mut [T]) -> Result<usize, RingError> {
        self.inner.try_pop(dst)
    }

    /// Dequeues up to `max` elements into a fresh vector.
    pub fn pop_vec(&self, max: usize) -> Result<Vec<T>, RingError> {
        let mut out = vec![T::default(); max];
        let taken = self.inner.pop(&mut out)?;
        out.truncate(taken);
        Ok(out)
    }

    /// Number of committed, unread elements. See [`Ring::len`].
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no committed element is waiting.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Current capacity of the backing array.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.inner.capacity()
    }

    /// Occupancy counter (committed plus pending producer bumps).
    #[inline]
    pub fn occupancy(&self) -> u32 {
        self.inner.occupancy()
    }

    /// Counter-and-flag snapshot. See [`Ring::state`].
    pub fn state(&self) -> RingState {
        self.inner.state()
    }

    /// Logs the queue state and cell contents. See [`Ring::print_state`].
    pub fn print_state(&self)
    where
        T: fmt::Debug,
    {
        self.inner.print_state();
    }

    /// Snapshot of the metrics if enabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics()
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
