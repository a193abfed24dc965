//! Wrap-around copies between circular regions.
//!
//! Everything here works on raw cell pointers: the ring's cells are shared
//! between threads under the reservation protocol, and forming `&[T]` slices
//! over regions another thread may touch would be a stricter claim than the
//! protocol grants.

use crate::invariants::debug_assert_region;
use crate::ring::RingError;
use std::ptr;

/// Copies the circular region `[src_start, src_end)` of a ring with
/// `src_cap` cells into the circular region of `dst` (a ring of `dst_cap`
/// cells) beginning at `dst_start`.
///
/// The region length is `(src_end - src_start) mod src_cap`; an empty region
/// copies nothing. Returns the number of elements moved, or
/// [`RingError::CapacityNotEnough`] when the destination ring cannot hold
/// them.
///
/// # Safety
///
/// `src` and `dst` must point to non-overlapping allocations of at least
/// `src_cap` and `dst_cap` elements, and no other thread may write the
/// source region or touch the destination region for the duration of the
/// call.
pub(crate) unsafe fn copy_circular<T: Copy + Default>(
    src: *const T,
    src_start: u32,
    src_end: u32,
    src_cap: u32,
    dst: *mut T,
    dst_start: u32,
    dst_cap: u32,
) -> Result<u32, RingError> {
    debug_assert_region!(src_start, src_cap);
    debug_assert_region!(src_end, src_cap);
    debug_assert_region!(dst_start, dst_cap);

    let len = (src_end + src_cap - src_start) % src_cap;
    if len == 0 {
        return Ok(0);
    }
    if len > dst_cap {
        return Err(RingError::CapacityNotEnough);
    }

    if src_start < src_end {
        // Contiguous source: at most two destination-side copies.
        copy_into_ring(src.add(src_start as usize), len, dst, dst_start, dst_cap);
    } else if dst_start + len <= dst_cap {
        // Wrapped source into linear destination room: two source-side copies.
        let first = src_cap - src_start;
        ptr::copy_nonoverlapping(
            src.add(src_start as usize),
            dst.add(dst_start as usize),
            first as usize,
        );
        ptr::copy_nonoverlapping(
            src,
            dst.add((dst_start + first) as usize),
            src_end as usize,
        );
    } else {
        // Both regions wrap: stage through a linear scratch buffer.
        let mut scratch = vec![T::default(); len as usize];
        let first = src_cap - src_start;
        ptr::copy_nonoverlapping(
            src.add(src_start as usize),
            scratch.as_mut_ptr(),
            first as usize,
        );
        ptr::copy_nonoverlapping(
            src,
            scratch.as_mut_ptr().add(first as usize),
            src_end as usize,
        );
        copy_into_ring(scratch.as_ptr(), len, dst, dst_start, dst_cap);
    }
    Ok(len)
}

/// Copies `len` elements from a linear source into the ring at `dst_start`,
/// splitting the write at the array boundary when the region wraps.
///
/// # Safety
///
/// Same contract as [`copy_circular`], with a linear source of at least
/// `len` elements.
pub(crate) unsafe fn copy_into_ring<T: Copy>(
    src: *const T,
    len: u32,
    dst: *mut T,
    dst_start: u32,
    dst_cap: u32,
) {
    if dst_start + len <= dst_cap {
        ptr::copy_nonoverlapping(src, dst.add(dst_start as usize), len as usize);
    } else {
        let first = dst_cap - dst_start;
        ptr::copy_nonoverlapping(src, dst.add(dst_start as usize), first as usize);
        ptr::copy_nonoverlapping(src.add(first as usize), dst, (len - first) as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Safe harness over `copy_circular` for Vec-backed rings.
    fn copy(
        src: &[u32],
        src_start: u32,
        src_end: u32,
        dst: &mut [u32],
        dst_start: u32,
    ) -> Result<u32, RingError> {
        unsafe {
            copy_circular(
                src.as_ptr(),
                src_start,
                src_end,
                src.len() as u32,
                dst.as_mut_ptr(),
                dst_start,
                dst.len() as u32,
            )
        }
    }

    /// Element-at-a-time reference for the same operation.
    fn copy_naive(
        src: &[u32],
        src_start: u32,
        src_end: u32,
        dst: &mut [u32],
        dst_start: u32,
    ) -> u32 {
        let src_cap = src.len() as u32;
        let dst_cap = dst.len() as u32;
        let len = (src_end + src_cap - src_start) % src_cap;
        for offset in 0..len {
            let from = ((src_start + offset) % src_cap) as usize;
            let to = ((dst_start + offset) % dst_cap) as usize;
            dst[to] = src[from];
        }
        len
    }

    #[test]
    fn contiguous_into_linear_room() {
        let src: Vec<u32> = (0..8).collect();
        let mut dst = vec![0u32; 16];
        assert_eq!(copy(&src, 2, 6, &mut dst, 0), Ok(4));
        assert_eq!(&dst[..4], &[2, 3, 4, 5]);
    }

    #[test]
    fn contiguous_into_wrapping_destination() {
        let src: Vec<u32> = (0..8).collect();
        let mut dst = vec![0u32; 8];
        assert_eq!(copy(&src, 0, 6, &mut dst, 5), Ok(6));
        assert_eq!(dst, vec![3, 4, 5, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn wrapped_source_into_linear_room() {
        let src: Vec<u32> = (0..8).collect();
        let mut dst = vec![0u32; 16];
        // [6, 7] then [0, 1, 2]
        assert_eq!(copy(&src, 6, 3, &mut dst, 1), Ok(5));
        assert_eq!(&dst[1..6], &[6, 7, 0, 1, 2]);
    }

    #[test]
    fn both_regions_wrap_through_scratch() {
        let src: Vec<u32> = (0..8).collect();
        let mut dst = vec![0u32; 8];
        let mut expected = vec![0u32; 8];
        let len = copy_naive(&src, 5, 3, &mut expected, 6);
        assert_eq!(copy(&src, 5, 3, &mut dst, 6), Ok(len));
        assert_eq!(dst, expected);
    }

    #[test]
    fn empty_region_copies_nothing() {
        let src: Vec<u32> = (0..8).collect();
        let mut dst = vec![9u32; 8];
        assert_eq!(copy(&src, 3, 3, &mut dst, 0), Ok(0));
        assert_eq!(dst, vec![9; 8]);
    }

    #[test]
    fn destination_too_small() {
        let src: Vec<u32> = (0..16).collect();
        let mut dst = vec![0u32; 4];
        assert_eq!(
            copy(&src, 0, 10, &mut dst, 0),
            Err(RingError::CapacityNotEnough)
        );
    }

    #[test]
    fn matches_reference_across_offsets() {
        let src: Vec<u32> = (100..116).collect();
        for src_start in 0..16 {
            for src_end in 0..16 {
                for dst_start in 0..16 {
                    let mut dst = vec![0u32; 16];
                    let mut expected = vec![0u32; 16];
                    let len = copy_naive(&src, src_start, src_end, &mut expected, dst_start);
                    assert_eq!(
                        copy(&src, src_start, src_end, &mut dst, dst_start),
                        Ok(len)
                    );
                    assert_eq!(dst, expected, "start {src_start} end {src_end} dst {dst_start}");
                }
            }
        }
    }
}
