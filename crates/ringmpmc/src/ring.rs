use crate::copy;
use crate::gate::Gate;
use crate::invariants::debug_assert_claim_len;
use crate::{Backoff, Config, Metrics, MetricsSnapshot};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

// =============================================================================
// SYNCHRONIZATION STRATEGY
// =============================================================================
//
// One shared cell array, four modular indices:
//
//   [cons_tail, prod_tail)  committed, unread data
//   [prod_tail, cons_tail + capacity)  free slots
//
// A producer claims a range by CAS on `prod_head`, writes it, waits until
// `prod_tail` reaches its claim start, then CASes `prod_tail` forward. The
// consumer side mirrors this on `cons_head`/`cons_tail`. Because each side
// commits strictly in claim order, the visible prefix of either side grows
// contiguously.
//
// ## Memory ordering
//
// - Claim and commit CASes release on success; the loads they depend on
//   (the opposite tail for consumers, the predecessor tail for commit
//   ordering) acquire. A consumer that sees `prod_tail` past a slot
//   therefore also sees the producer's writes to it.
// - The worker/expander handshake is the store-buffering shape: a thread
//   bumps `workers` *then* checks `in_expansion`, while the expander raises
//   `in_expansion` *then* drains `workers`. Both sides run SeqCst so one of
//   them is guaranteed to see the other.
// - Publication of a new array pairs the expander's releasing stores with
//   the acquiring loads every worker performs on entry.
//
// ## Occupancy accounting
//
// `size` is bumped by producers *before* they claim (the admission check)
// and dropped by consumers *after* they commit. It may transiently exceed
// the committed count, never undershoot it. Admission keeps the committed
// count strictly below capacity, which is what makes `prod_tail ==
// cons_head` unambiguous (always "empty", never "full").
//
// =============================================================================

/// Failures surfaced by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// A producer commit advanced the tail by an unexpected delta. Indicates
    /// protocol corruption; not recoverable.
    #[error("push commit advanced by an unexpected delta")]
    PushCommit,
    /// The queue stayed empty for the whole pop timeout.
    #[error("pop timed out on an empty buffer")]
    PopTimeout,
    /// A consumer commit advanced the tail by an unexpected delta. Indicates
    /// protocol corruption; not recoverable.
    #[error("pop commit advanced by an unexpected delta")]
    PopCommit,
    /// Another thread currently owns the expansion. Transient; retry.
    #[error("another thread is expanding the buffer")]
    InExpansion,
    /// Growing further would pass the configured ceiling.
    #[error("expansion would exceed the capacity ceiling")]
    CapacityExceeded,
    /// The destination region cannot hold the requested elements.
    #[error("destination region cannot hold the requested elements")]
    CapacityNotEnough,
}

/// Head/tail pair for one side of the protocol.
#[derive(Debug)]
pub(crate) struct IndexPair {
    pub(crate) head: AtomicU32,
    pub(crate) tail: AtomicU32,
}

impl IndexPair {
    fn new() -> Self {
        Self {
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
        }
    }
}

/// Bounded MPMC ring buffer that grows under pressure.
///
/// Any number of threads may push and pop concurrently. When occupancy
/// crosses the high-water mark (or a batch cannot fit), one producer is
/// elected to rehost the live elements into an array twice the size, up to
/// the configured ceiling; everyone else parks for the duration.
///
/// Elements are plain copyable values (`T: Copy + Default`). Share a `Ring`
/// across threads behind an `Arc`, or use [`Queue`](crate::Queue) which does
/// that for you.
pub struct Ring<T> {
    // === PRODUCER HOT ===
    pub(crate) prod: CachePadded<IndexPair>,

    // === CONSUMER HOT ===
    pub(crate) cons: CachePadded<IndexPair>,

    // === OCCUPANCY ===
    pub(crate) size: CachePadded<AtomicU32>,

    // === EXPANSION COORDINATION ===
    pub(crate) workers: CachePadded<AtomicU32>,
    pub(crate) in_expansion: AtomicBool,
    pub(crate) unique_expander: AtomicBool,
    pub(crate) gate: Gate,

    // === GEOMETRY === (written only by the expander)
    pub(crate) capacity: AtomicU32,
    pub(crate) high_water: AtomicU32,

    pub(crate) config: Config,
    pub(crate) metrics: Metrics,

    // === CELLS ===
    // Replaced as a unit by the expander while quiescence holds. Cell access
    // goes through raw pointers under the reservation protocol.
    pub(crate) buffer: UnsafeCell<Box<[UnsafeCell<T>]>>,
}

// Safety: cells hold plain `Copy` data and every access is governed by the
// reservation protocol (claims partition the array, commits publish with
// release/acquire).
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T: Copy + Default> Ring<T> {
    /// Creates a ring with `config.initial_capacity` clamped into the
    /// allowed range.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid; see
    /// [`Config`](crate::Config).
    pub fn new(config: Config) -> Self {
        config.validate();
        let capacity = config.clamped_capacity();
        Self {
            prod: CachePadded::new(IndexPair::new()),
            cons: CachePadded::new(IndexPair::new()),
            size: CachePadded::new(AtomicU32::new(0)),
            workers: CachePadded::new(AtomicU32::new(0)),
            in_expansion: AtomicBool::new(false),
            unique_expander: AtomicBool::new(false),
            gate: Gate::new(),
            capacity: AtomicU32::new(capacity),
            high_water: AtomicU32::new(config.high_water(capacity)),
            config,
            metrics: Metrics::new(),
            buffer: UnsafeCell::new(Self::alloc_cells(capacity)),
        }
    }

    pub(crate) fn alloc_cells(capacity: u32) -> Box<[UnsafeCell<T>]> {
        let mut cells = Vec::with_capacity(capacity as usize);
        cells.resize_with(capacity as usize, || UnsafeCell::new(T::default()));
        cells.into_boxed_slice()
    }

    /// Base pointer of the cell array.
    ///
    /// `UnsafeCell<T>` is `repr(transparent)`, so the cell array has the
    /// layout of a `T` array. Callers must hold the protocol's access rights
    /// to whatever region they dereference.
    pub(crate) fn cells(&self) -> *mut T {
        unsafe { (*self.buffer.get()).as_ptr().cast::<T>().cast_mut() }
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    /// Current capacity of the backing array.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity.load(Ordering::Acquire)
    }

    /// Number of committed, unread elements.
    ///
    /// Exact when the queue is quiescent; a racy estimate under traffic.
    pub fn len(&self) -> usize {
        let capacity = self.capacity.load(Ordering::Acquire);
        let prod_tail = self.prod.tail.load(Ordering::Acquire);
        let cons_head = self.cons.head.load(Ordering::Acquire);
        ((prod_tail + capacity - cons_head) % capacity) as usize
    }

    /// Returns true if no committed element is waiting.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupancy counter: committed elements plus pending producer bumps.
    #[inline]
    pub fn occupancy(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    /// Snapshot of the metrics if enabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ---------------------------------------------------------------------
    // PRODUCER PATH
    // ---------------------------------------------------------------------

    /// Enqueues all of `src`, in order, as one contiguous batch.
    ///
    /// Returns `Ok(src.len())` on success. Blocks while an expansion is in
    /// flight and may itself trigger one; a batch that cannot fit even at
    /// the capacity ceiling fails with [`RingError::CapacityExceeded`] (or
    /// [`RingError::CapacityNotEnough`] if it could never fit).
    pub fn push(&self, src: &[T]) -> Result<usize, RingError> {
        if src.is_empty() {
            return Ok(0);
        }
        if src.len() >= self.config.max_capacity as usize {
            return Err(RingError::CapacityNotEnough);
        }
        let n = src.len() as u32;

        self.wait_while_expanding();
        self.admit(n)?;

        self.begin_work();
        let result = self.push_claimed(src, n);
        self.end_work();

        if self.config.enable_metrics && result.is_ok() {
            self.metrics.add_push(u64::from(n));
        }
        result
    }

    /// Like [`push`](Ring::push), but refuses to park: an expansion observed
    /// on entry surfaces as [`RingError::InExpansion`].
    pub fn try_push(&self, src: &[T]) -> Result<usize, RingError> {
        if self.in_expansion.load(Ordering::Acquire) {
            return Err(RingError::InExpansion);
        }
        self.push(src)
    }

    /// Tentative occupancy bump plus the expansion trigger loop.
    ///
    /// On `Err` the bump has been rolled back.
    fn admit(&self, n: u32) -> Result<(), RingError> {
        let mut occupancy = self.size.fetch_add(n, Ordering::AcqRel) + n;
        let mut backoff = Backoff::new();
        loop {
            let capacity = self.capacity.load(Ordering::Acquire);
            let over_water = occupancy > self.high_water.load(Ordering::Acquire);
            // Keeping the committed count strictly below capacity is what
            // disambiguates a full ring from an empty one.
            let unfit = occupancy >= capacity || n >= capacity;
            if !over_water && !unfit {
                return Ok(());
            }

            match self.expand() {
                Ok(_) => {}
                Err(RingError::InExpansion) => {
                    // Someone else owns the expansion; wait it out.
                    backoff.snooze();
                    self.wait_while_expanding();
                }
                Err(RingError::CapacityExceeded) => {
                    // At the ceiling. Re-check with fresh values: the batch
                    // either still fits (the high-water line is only a
                    // preference) or it never will.
                    let capacity = self.capacity.load(Ordering::Acquire);
                    occupancy = self.size.load(Ordering::Acquire);
                    if occupancy >= capacity || n >= capacity {
                        self.size.fetch_sub(n, Ordering::AcqRel);
                        return Err(RingError::CapacityExceeded);
                    }
                    return Ok(());
                }
                Err(err) => {
                    self.size.fetch_sub(n, Ordering::AcqRel);
                    return Err(err);
                }
            }
            occupancy = self.size.load(Ordering::Acquire);
        }
    }

    /// Claim, write, and commit one producer batch. Runs inside a worker
    /// section, so the capacity and array are frozen.
    fn push_claimed(&self, src: &[T], n: u32) -> Result<usize, RingError> {
        let capacity = self.capacity.load(Ordering::Acquire);
        debug_assert_claim_len!(n, capacity);

        // Claim [old_head, old_head + n) on the producer index.
        let mut old_head = self.prod.head.load(Ordering::Relaxed);
        let new_head = loop {
            let next = (old_head + n) % capacity;
            match self.prod.head.compare_exchange_weak(
                old_head,
                next,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break next,
                Err(current) => old_head = current,
            }
        };

        // SAFETY: the CAS above granted exclusive write access to the
        // claimed range. Consumers stop at `prod_tail`, which has not
        // crossed `old_head` yet, and admission keeps producers off slots
        // that still hold unread data.
        unsafe {
            copy::copy_into_ring(src.as_ptr(), n, self.cells(), old_head, capacity);
        }

        // Commits land in claim order: wait for the predecessor.
        let mut backoff = Backoff::new();
        while self.prod.tail.load(Ordering::Acquire) != old_head {
            backoff.snooze();
        }

        // Publish [old_head, new_head) to consumers.
        if self
            .prod
            .tail
            .compare_exchange(old_head, new_head, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            return Err(RingError::PushCommit);
        }
        Ok(n as usize)
    }

    // ---------------------------------------------------------------------
    // CONSUMER PATH
    // ---------------------------------------------------------------------

    /// Dequeues up to `dst.len()` elements into the front of `dst`.
    ///
    /// Returns how many were copied: at least one, at most the committed
    /// occupancy and the configured burst cap. Blocks while the queue is
    /// empty; after `pop_timeout` of emptiness returns
    /// [`RingError::PopTimeout`].
    pub fn pop(&self, dst: &mut [T]) -> Result<usize, RingError> {
        if dst.is_empty() {
            return Ok(0);
        }
        let deadline = Instant::now() + self.config.pop_timeout;
        loop {
            self.wait_while_expanding();

            if self.is_empty() {
                if Instant::now() >= deadline {
                    if self.config.enable_metrics {
                        self.metrics.add_pop_timeout();
                    }
                    return Err(RingError::PopTimeout);
                }
                thread::yield_now();
                continue;
            }

            self.begin_work();
            let result = self.pop_claimed(dst);
            self.end_work();

            match result {
                // Lost the committed data to other consumers; go around.
                Ok(0) => {}
                Ok(taken) => {
                    if self.config.enable_metrics {
                        self.metrics.add_pop(taken as u64);
                    }
                    return Ok(taken);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Single non-blocking dequeue attempt.
    ///
    /// Returns `Ok(0)` when nothing is committed, and
    /// [`RingError::InExpansion`] when an expansion is in flight.
    pub fn try_pop(&self, dst: &mut [T]) -> Result<usize, RingError> {
        if dst.is_empty() || self.is_empty() {
            return Ok(0);
        }
        if !self.try_begin_work() {
            return Err(RingError::InExpansion);
        }
        let result = self.pop_claimed(dst);
        self.end_work();

        if self.config.enable_metrics {
            if let Ok(taken) = result {
                if taken > 0 {
                    self.metrics.add_pop(taken as u64);
                }
            }
        }
        result
    }

    /// Claim, copy out, and commit one consumer batch. Runs inside a worker
    /// section. Returns `Ok(0)` when other consumers drained the queue
    /// between the caller's emptiness check and the claim.
    fn pop_claimed(&self, dst: &mut [T]) -> Result<usize, RingError> {
        let capacity = self.capacity.load(Ordering::Acquire);

        // Claim up to `burst_max` committed elements on the consumer index.
        // The claim length is recomputed against `prod_tail` on every
        // attempt, so a claim never covers uncommitted slots.
        let mut old_head = self.cons.head.load(Ordering::Relaxed);
        let (old_head, new_head, take) = loop {
            let prod_tail = self.prod.tail.load(Ordering::Acquire);
            let committed = (prod_tail + capacity - old_head) % capacity;
            let take = (dst.len().min(capacity as usize) as u32)
                .min(committed)
                .min(self.config.burst_max);
            if take == 0 {
                return Ok(0);
            }
            let next = (old_head + take) % capacity;
            match self.cons.head.compare_exchange_weak(
                old_head,
                next,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break (old_head, next, take),
                Err(current) => old_head = current,
            }
        };
        debug_assert_claim_len!(take, capacity);

        // SAFETY: the CAS granted exclusive read access to the claimed
        // range; producers reuse these slots only after the occupancy
        // counter drops below.
        let copied = unsafe {
            copy::copy_circular(
                self.cells(),
                old_head,
                new_head,
                capacity,
                dst.as_mut_ptr(),
                0,
                take,
            )?
        };
        if copied != take {
            return Err(RingError::PopCommit);
        }

        // Commits land in claim order: wait for the predecessor.
        let mut backoff = Backoff::new();
        while self.cons.tail.load(Ordering::Acquire) != old_head {
            backoff.snooze();
        }
        if self
            .cons
            .tail
            .compare_exchange(old_head, new_head, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            return Err(RingError::PopCommit);
        }
        self.size.fetch_sub(take, Ordering::AcqRel);
        Ok(take as usize)
    }

    // ---------------------------------------------------------------------
    // WORKER HANDSHAKE
    // ---------------------------------------------------------------------

    #[inline]
    pub(crate) fn wait_while_expanding(&self) {
        self.gate
            .wait_while(|| self.in_expansion.load(Ordering::Acquire));
    }

    /// Enters a worker section. The counter bump comes first and the flag
    /// check second (SeqCst on both), so either the expander's drain loop
    /// sees this worker or this worker sees the flag and backs out.
    pub(crate) fn begin_work(&self) {
        loop {
            self.workers.fetch_add(1, Ordering::SeqCst);
            if !self.in_expansion.load(Ordering::SeqCst) {
                return;
            }
            self.workers.fetch_sub(1, Ordering::SeqCst);
            self.wait_while_expanding();
        }
    }

    /// Non-parking variant of [`begin_work`](Ring::begin_work): backs out
    /// and reports failure instead of waiting at the gate.
    pub(crate) fn try_begin_work(&self) -> bool {
        self.workers.fetch_add(1, Ordering::SeqCst);
        if self.in_expansion.load(Ordering::SeqCst) {
            self.workers.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    #[inline]
    pub(crate) fn end_work(&self) {
        self.workers.fetch_sub(1, Ordering::SeqCst);
    }

    // ---------------------------------------------------------------------
    // DIAGNOSTICS
    // ---------------------------------------------------------------------

    /// Snapshot of the counters and flags. Exact when quiescent.
    pub fn state(&self) -> RingState {
        RingState {
            capacity: self.capacity.load(Ordering::Acquire),
            occupancy: self.size.load(Ordering::Acquire),
            prod_head: self.prod.head.load(Ordering::Acquire),
            prod_tail: self.prod.tail.load(Ordering::Acquire),
            cons_head: self.cons.head.load(Ordering::Acquire),
            cons_tail: self.cons.tail.load(Ordering::Acquire),
            workers: self.workers.load(Ordering::Acquire),
            in_expansion: self.in_expansion.load(Ordering::Acquire),
        }
    }

    /// Logs the counters and the per-cell contents with index markers.
    ///
    /// Purely observational: indices and contents are left untouched. Cell
    /// values read under concurrent traffic may be stale; the cell dump is
    /// skipped entirely while an expansion is rehosting the array.
    pub fn print_state(&self)
    where
        T: fmt::Debug,
    {
        let state = self.state();
        info!(?state, "ring state");
        if state.in_expansion {
            return;
        }

        let cells = self.cells();
        for idx in 0..state.capacity {
            let mut markers = String::new();
            for (position, name) in [
                (state.cons_tail, "cons_tail"),
                (state.cons_head, "cons_head"),
                (state.prod_tail, "prod_tail"),
                (state.prod_head, "prod_head"),
            ] {
                if position == idx {
                    if !markers.is_empty() {
                        markers.push(' ');
                    }
                    markers.push_str("<- ");
                    markers.push_str(name);
                }
            }
            // SAFETY: in-bounds read of plain copyable data; the value may
            // be stale under traffic but the access cannot tear the queue.
            let value = unsafe { std::ptr::read(cells.add(idx as usize)) };
            info!(idx, value = ?value, %markers, "cell");
        }
    }
}

/// Plain-data view of the ring's counters and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingState {
    pub capacity: u32,
    pub occupancy: u32,
    pub prod_head: u32,
    pub prod_tail: u32,
    pub cons_head: u32,
    pub cons_tail: u32,
    pub workers: u32,
    pub in_expansion: bool,
}
