//! Capacity expansion: election, optimistic pre-copy, quiescence, publish.

use crate::copy;
use crate::invariants::{debug_assert_live_fits, debug_assert_quiescent};
use crate::ring::{Ring, RingError};
use crate::{Backoff, EXPANSION_FACTOR};
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

impl<T: Copy + Default> Ring<T> {
    /// Grows the backing array by the expansion factor, rehosting the live
    /// elements in order.
    ///
    /// At most one thread runs this at a time; a caller that loses the
    /// election gets [`RingError::InExpansion`] and is expected to back off
    /// and re-check occupancy. At the capacity ceiling the election is
    /// released immediately with [`RingError::CapacityExceeded`].
    pub(crate) fn expand(&self) -> Result<u32, RingError> {
        // Election: at most one expander.
        if self
            .unique_expander
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RingError::InExpansion);
        }

        let old_cap = self.capacity.load(Ordering::Acquire);
        if old_cap >= self.config.max_capacity {
            self.unique_expander.store(false, Ordering::Release);
            return Err(RingError::CapacityExceeded);
        }
        let new_cap = old_cap
            .saturating_mul(EXPANSION_FACTOR)
            .min(self.config.max_capacity);
        debug!(old_cap, new_cap, "expansion started");

        let new_cells = Self::alloc_cells(new_cap);
        let new_base = new_cells.as_ptr().cast::<T>().cast_mut();

        // Optimistic pre-copy of the committed region. Producers and
        // consumers are still running against the old array, so this copy
        // may lag behind; the quiesced phase below patches it up.
        let pre_cons_head = self.cons.head.load(Ordering::Acquire);
        let pre_prod_tail = self.prod.tail.load(Ordering::Acquire);
        // SAFETY: `[pre_cons_head, pre_prod_tail)` was committed data at the
        // snapshot. Producers never write a slot whose element has not been
        // popped, so a racy read can hit only slots drained by a concurrent
        // pop; whatever lands in the copy for those is cut off by the index
        // rebase below.
        let copied = match unsafe {
            copy::copy_circular(
                self.cells(),
                pre_cons_head,
                pre_prod_tail,
                old_cap,
                new_base,
                0,
                new_cap,
            )
        } {
            Ok(count) => count,
            Err(err) => {
                self.unique_expander.store(false, Ordering::Release);
                return Err(err);
            }
        };

        // Quiescence: park new entrants, then drain in-flight workers. The
        // SeqCst store/loads pair with the handshake in `begin_work`.
        if self
            .in_expansion
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("quiescence flag was already raised; abandoning this attempt");
            self.unique_expander.store(false, Ordering::Release);
            return Err(RingError::InExpansion);
        }
        let mut backoff = Backoff::new();
        while self.workers.load(Ordering::SeqCst) != 0 {
            backoff.snooze();
        }
        debug_assert_quiescent!(self.workers.load(Ordering::SeqCst));

        // Catch up on the traffic that beat quiescence: batches committed
        // after the pre-copy land behind it, and pops that ran during the
        // pre-copy shrink the live window from the front.
        let final_prod_head = self.prod.head.load(Ordering::Acquire);
        let final_cons_head = self.cons.head.load(Ordering::Acquire);
        // SAFETY: no worker is active and new entrants are parked; this
        // thread owns the old array.
        let appended = match unsafe {
            copy::copy_circular(
                self.cells(),
                pre_prod_tail,
                final_prod_head,
                old_cap,
                new_base,
                copied % new_cap,
                new_cap,
            )
        } {
            Ok(count) => count,
            Err(err) => {
                self.release_expansion();
                return Err(err);
            }
        };
        let consumed = (final_cons_head + old_cap - pre_cons_head) % old_cap;
        let live_end = (copied + appended) % new_cap;
        debug_assert_live_fits!((copied + appended).saturating_sub(consumed), new_cap);

        // Publish: swap the array, then rebase the geometry and the index
        // quartet. The pointer swap is the linearization point between the
        // old and the new array.
        // SAFETY: quiescence holds, so no other thread touches the buffer
        // slot during the swap.
        unsafe {
            *self.buffer.get() = new_cells;
        }
        self.capacity.store(new_cap, Ordering::Release);
        self.high_water
            .store(self.config.high_water(new_cap), Ordering::Release);
        self.cons.head.store(consumed, Ordering::Release);
        self.cons.tail.store(consumed, Ordering::Release);
        self.prod.head.store(live_end, Ordering::Release);
        self.prod.tail.store(live_end, Ordering::Release);
        // The occupancy counter is deliberately left alone: it already
        // carries the bumps of producers parked at the gate.

        self.release_expansion();
        if self.config.enable_metrics {
            self.metrics.add_expansion();
        }
        debug!(new_cap, "expansion finished");
        Ok(new_cap)
    }

    /// Drops both expansion flags and wakes everyone parked at the gate.
    fn release_expansion(&self) {
        if self
            .in_expansion
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("quiescence flag was dropped by someone else");
        }
        if self
            .unique_expander
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("election flag was dropped by someone else");
        }
        self.gate.open();
    }
}

#[cfg(test)]
mod tests {
    use crate::{Config, Ring, RingError};

    #[test]
    fn expansion_rebases_a_wrapped_ring() {
        let ring = Ring::<u32>::new(Config::new(16));

        // Wrap the live window around the array boundary: fill, drain most,
        // refill past the seam.
        ring.push(&(0..12).collect::<Vec<_>>()).unwrap();
        let mut out = vec![0u32; 10];
        assert_eq!(ring.pop(&mut out), Ok(10));
        ring.push(&(12..24).collect::<Vec<_>>()).unwrap();
        assert_eq!(ring.capacity(), 16);
        assert_eq!(ring.len(), 14);

        // One more batch crosses the high-water mark and forces a rehost.
        ring.push(&[24, 25]).unwrap();
        assert_eq!(ring.capacity(), 32);

        let mut drained = Vec::new();
        let mut out = vec![0u32; 16];
        while drained.len() < 16 {
            let taken = ring.pop(&mut out).unwrap();
            drained.extend_from_slice(&out[..taken]);
        }
        assert_eq!(drained, (10..26).collect::<Vec<_>>());
        assert!(ring.is_empty());
    }

    #[test]
    fn expansion_is_monotonic_up_to_the_ceiling() {
        let config = Config {
            max_capacity: 64,
            ..Config::new(16)
        };
        let ring = Ring::<u32>::new(config);

        let mut last = ring.capacity();
        for round in 0..6 {
            match ring.expand() {
                Ok(new_cap) => {
                    assert!(new_cap > last, "round {round} shrank the ring");
                    last = new_cap;
                }
                Err(RingError::CapacityExceeded) => {
                    assert_eq!(last, 64);
                    return;
                }
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        panic!("the ceiling was never reached");
    }

    #[test]
    fn expansion_of_an_empty_ring_keeps_it_empty() {
        let ring = Ring::<u32>::new(Config::new(16));
        assert_eq!(ring.expand(), Ok(32));
        assert!(ring.is_empty());
        assert_eq!(ring.occupancy(), 0);

        ring.push(&[1, 2, 3]).unwrap();
        let mut out = [0u32; 3];
        assert_eq!(ring.pop(&mut out), Ok(3));
        assert_eq!(out, [1, 2, 3]);
    }
}
