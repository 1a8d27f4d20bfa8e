// MIT License
// Copyright 2025--present gametracer developers

//! Copying solver output back across the boundary.
//!
//! Two shapes of output exist:
//!
//! - **Caller-owned vectors** (IPA's `zh` and `ans`): the shim writes `M`
//!   doubles into storage the caller supplied. Nothing is allocated.
//! - **The GNM result block**: one contiguous `malloc` allocation of
//!   `found * M` doubles, equilibrium `k` at `[k*M, (k+1)*M)`. Ownership
//!   passes to the caller, who must hand it back to `gametracer_free`.
//!
//! [`ResultBlock`] owns the allocation until [`ResultBlock::into_raw`] gives
//! it away, so an error between allocation and hand-off frees it again.

use std::ptr::NonNull;

use crate::error::ShimError;
use crate::solver::EquilibriumHandle;

/// A `malloc`-backed block of doubles destined for the caller.
#[derive(Debug)]
pub struct ResultBlock {
    ptr: NonNull<f64>,
    len: usize,
}

impl ResultBlock {
    /// Allocate `rows * row_len` zeroed doubles on the process heap.
    ///
    /// Both dimensions must be non-zero. Overflow of the byte count or a
    /// NULL from `malloc` is reported as [`ShimError::Allocation`].
    pub fn allocate(rows: usize, row_len: usize) -> Result<Self, ShimError> {
        if rows == 0 || row_len == 0 {
            return Err(ShimError::internal("result block must not be empty"));
        }
        let len = rows
            .checked_mul(row_len)
            .ok_or(ShimError::Allocation { bytes: usize::MAX })?;
        let bytes = len
            .checked_mul(std::mem::size_of::<f64>())
            .ok_or(ShimError::Allocation { bytes: usize::MAX })?;

        let raw = malloc_block(bytes);
        let ptr = NonNull::new(raw).ok_or(ShimError::Allocation { bytes })?;
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };
        Ok(Self { ptr, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[f64] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Give the allocation away. The receiver must release it with
    /// [`release_block`].
    pub fn into_raw(self) -> *mut f64 {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }
}

#[cfg(not(test))]
fn malloc_block(bytes: usize) -> *mut f64 {
    unsafe { libc::malloc(bytes) }.cast()
}

#[cfg(test)]
fn malloc_block(bytes: usize) -> *mut f64 {
    if tests::FAIL_NEXT_BLOCK.with(|fail| fail.replace(false)) {
        return std::ptr::null_mut();
    }
    unsafe { libc::malloc(bytes) }.cast()
}

impl Drop for ResultBlock {
    fn drop(&mut self) {
        unsafe { libc::free(self.ptr.as_ptr().cast()) };
    }
}

/// Release a block previously produced by [`ResultBlock::into_raw`].
/// NULL is a no-op.
///
/// # Safety
/// `ptr` must be NULL or a pointer obtained from `ResultBlock::into_raw`
/// that has not been released yet.
pub unsafe fn release_block(ptr: *mut f64) {
    if !ptr.is_null() {
        unsafe { libc::free(ptr.cast()) };
    }
}

/// Pack GNM answers row by row into a fresh [`ResultBlock`].
///
/// Every answer must hold exactly `row_len` values. The handles are only
/// borrowed; the caller still drops (and so releases) them afterwards,
/// whether packing succeeded or not.
pub fn pack_equilibria(
    equilibria: &[EquilibriumHandle],
    row_len: usize,
) -> Result<ResultBlock, ShimError> {
    if let Some((k, bad)) = equilibria
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != row_len)
    {
        return Err(ShimError::internal(format!(
            "equilibrium {k} has {} entries, expected {row_len}",
            bad.len()
        )));
    }

    let mut block = ResultBlock::allocate(equilibria.len(), row_len)?;
    let rows = block.as_mut_slice();
    for (row, eq) in rows.chunks_exact_mut(row_len).zip(equilibria) {
        row.copy_from_slice(eq.values());
    }
    Ok(block)
}

/// Copy `src` into a caller-owned buffer of at least `src.len()` doubles.
///
/// # Safety
/// `dst` must be valid for `src.len()` writes and must not overlap `src`.
pub(crate) unsafe fn copy_out(dst: *mut f64, src: &[f64]) {
    unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len()) };
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        pub(crate) static FAIL_NEXT_BLOCK: Cell<bool> = const { Cell::new(false) };
    }

    /// Make the next [`ResultBlock::allocate`] on this thread see a NULL
    /// from `malloc`.
    pub(crate) fn fail_next_block() {
        FAIL_NEXT_BLOCK.with(|fail| fail.set(true));
    }

    #[test]
    fn failed_malloc_is_allocation_failure() {
        fail_next_block();
        let err = ResultBlock::allocate(2, 5).unwrap_err();
        assert!(matches!(err, ShimError::Allocation { bytes: 80 }));
        assert_eq!(err.code(), -2);
        // one-shot
        assert_eq!(ResultBlock::allocate(2, 5).unwrap().len(), 10);
    }

    #[test]
    fn failed_block_still_leaves_handles_to_the_caller() {
        let eqs = vec![
            EquilibriumHandle::new(vec![1.0, 0.0]),
            EquilibriumHandle::new(vec![0.0, 1.0]),
        ];
        fail_next_block();
        assert_eq!(pack_equilibria(&eqs, 2).unwrap_err().code(), -2);
        assert_eq!(eqs[1].values(), &[0.0, 1.0]);
    }

    #[test]
    fn allocate_and_release_round_trip() {
        let mut block = ResultBlock::allocate(3, 4).unwrap();
        assert_eq!(block.len(), 12);
        block.as_mut_slice().iter_mut().enumerate().for_each(|(i, v)| *v = i as f64);
        assert_eq!(block.as_slice()[11], 11.0);
        let raw = block.into_raw();
        assert!(!raw.is_null());
        unsafe { release_block(raw) };
    }

    #[test]
    fn release_null_is_noop() {
        unsafe { release_block(std::ptr::null_mut()) };
    }

    #[test]
    fn oversized_block_is_allocation_failure() {
        let err = ResultBlock::allocate(usize::MAX, 2).unwrap_err();
        assert_eq!(err.code(), -2);
        let err = ResultBlock::allocate(usize::MAX / 4, 1).unwrap_err();
        assert_eq!(err.code(), -2);
    }

    #[test]
    fn empty_block_is_refused() {
        assert_eq!(ResultBlock::allocate(0, 5).unwrap_err().code(), -3);
        assert_eq!(ResultBlock::allocate(5, 0).unwrap_err().code(), -3);
    }

    #[test]
    fn rows_are_packed_at_k_times_m() {
        let eqs = vec![
            EquilibriumHandle::new(vec![1.0, 0.0, 0.5, 0.5, 0.0]),
            EquilibriumHandle::new(vec![0.0, 1.0, 0.0, 0.0, 1.0]),
            EquilibriumHandle::new(vec![0.2, 0.8, 1.0, 0.0, 0.0]),
        ];
        let block = pack_equilibria(&eqs, 5).unwrap();
        let data = block.as_slice();
        for (row, eq) in eqs.iter().enumerate() {
            for i in 0..5 {
                assert_eq!(data[row * 5 + i], eq.values()[i]);
            }
        }
    }

    #[test]
    fn mismatched_row_is_internal_error() {
        let eqs = vec![
            EquilibriumHandle::new(vec![1.0, 0.0]),
            EquilibriumHandle::new(vec![1.0]),
        ];
        let err = pack_equilibria(&eqs, 2).unwrap_err();
        assert_eq!(err.code(), -3);
        assert!(err.to_string().contains("equilibrium 1 has 1 entries"));
    }

    #[test]
    fn copy_out_overwrites_destination() {
        let mut dst = [9.0; 3];
        unsafe { copy_out(dst.as_mut_ptr(), &[1.0, 2.0, 3.0]) };
        assert_eq!(dst, [1.0, 2.0, 3.0]);
    }
}
