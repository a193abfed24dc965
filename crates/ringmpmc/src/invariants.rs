//! Debug-build assertions for the reservation and expansion protocol.
//!
//! Only active under `debug_assertions`; release builds compile these away.

/// A claimed range must be shorter than the ring itself, or the modular
/// index arithmetic stops describing a region.
macro_rules! debug_assert_claim_len {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len < $capacity,
            "claimed {} slots in a ring of {}",
            $len,
            $capacity
        )
    };
}

/// Circular region offsets are always reduced modulo the capacity before
/// they reach the copy helpers.
macro_rules! debug_assert_region {
    ($start:expr, $capacity:expr) => {
        debug_assert!(
            $start < $capacity,
            "region offset {} outside a ring of {}",
            $start,
            $capacity
        )
    };
}

/// The expander may only touch the backing array once every in-flight
/// worker has drained.
macro_rules! debug_assert_quiescent {
    ($workers:expr) => {
        debug_assert!(
            $workers == 0,
            "publishing with {} workers still active",
            $workers
        )
    };
}

/// Rehosted data must fit the new array with room to spare; a full ring is
/// indistinguishable from an empty one under modular indices.
macro_rules! debug_assert_live_fits {
    ($live:expr, $capacity:expr) => {
        debug_assert!(
            $live < $capacity,
            "rehosted {} elements into a ring of {}",
            $live,
            $capacity
        )
    };
}

pub(crate) use debug_assert_claim_len;
pub(crate) use debug_assert_live_fits;
pub(crate) use debug_assert_quiescent;
pub(crate) use debug_assert_region;
