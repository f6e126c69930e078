//! Tracked allocator backing every runtime allocation.
//!
//! The runtime passes only the alignment back on deallocate/reallocate, so
//! each block carries its own size. Layout of one block:
//!
//! ```text
//! base                                   user pointer
//! |  padding  | total size: usize        | user bytes ...
//! |<------- header_bytes(alignment) ---->|
//! ```
//!
//! `header_bytes = max(alignment, size_of::<usize>())` keeps the user pointer
//! aligned and leaves room for the size word directly before it. The stored
//! size is the *total* block size (header + padding + user bytes).
//!
//! The `try_*` methods report failures as `HostError`. The plain methods used
//! by the runtime callbacks treat any failure as fatal.

use std::alloc::{alloc, dealloc, Layout};
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};

use sigil_hostapi::{BufferAllocator, HostError};

use crate::fatal;

/// Bytes reserved in front of the user pointer for a given alignment.
pub const fn header_bytes(alignment: usize) -> usize {
    let word = size_of::<usize>();
    if alignment > word {
        alignment
    } else {
        word
    }
}

/// Allocation counters. `live_*` return to zero when everything is freed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Blocks allocated and not yet released.
    pub live_blocks: usize,
    /// Total bytes (headers included) of the live blocks.
    pub live_bytes: usize,
    /// Highest `live_bytes` seen.
    pub peak_bytes: usize,
    /// Allocations performed, reallocations included.
    pub total_allocations: u64,
}

impl AllocatorStats {
    pub fn has_leaks(&self) -> bool {
        self.live_blocks > 0
    }
}

/// Size-header allocator over the system allocator.
#[derive(Debug, Default)]
pub struct TrackedAllocator {
    stats: AllocatorStats,
    trace: bool,
}

impl TrackedAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a `trace` event per operation.
    pub fn with_tracing(trace: bool) -> Self {
        Self {
            stats: AllocatorStats::default(),
            trace,
        }
    }

    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }

    pub fn has_leaks(&self) -> bool {
        self.stats.has_leaks()
    }

    /// Allocate `size` user bytes at `alignment`.
    pub fn try_allocate(
        &mut self,
        size: usize,
        alignment: usize,
    ) -> Result<NonNull<u8>, HostError> {
        check_alignment(alignment)?;
        let header = header_bytes(alignment);
        let total = size
            .checked_add(header)
            .ok_or(HostError::SizeOverflow { size, header })?;
        let layout =
            block_layout(total, alignment).ok_or(HostError::SizeOverflow { size, header })?;

        // SAFETY: `layout` has a non-zero size (header >= one word).
        let base = unsafe { alloc(layout) };
        let base = NonNull::new(base).ok_or(HostError::AllocationFailed {
            size: total,
            alignment,
        })?;

        // SAFETY: `header <= total`, so the user pointer and the size word
        // directly before it are inside the block.
        let user = unsafe {
            let user = base.as_ptr().add(header);
            write_total(user, total);
            NonNull::new_unchecked(user)
        };

        self.stats.live_blocks += 1;
        self.stats.live_bytes += total;
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.stats.live_bytes);
        self.stats.total_allocations += 1;
        if self.trace {
            tracing::trace!(size, alignment, total, ptr = ?user, "allocate");
        }
        Ok(user)
    }

    /// Allocate, terminating the process on failure.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> *mut u8 {
        match self.try_allocate(size, alignment) {
            Ok(ptr) => ptr.as_ptr(),
            Err(err) => fatal::abort_with(&format!("allocation failed: {}", err)),
        }
    }

    /// Release a block. Null pointers are ignored.
    ///
    /// # Safety
    /// `ptr` must be null or a live pointer returned by this allocator with
    /// the same `alignment`.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8, alignment: usize) {
        if ptr.is_null() {
            return;
        }
        let header = header_bytes(alignment);
        let total = read_total(ptr);
        let base = ptr.sub(header);
        // Same size and alignment the block was created with.
        let layout = Layout::from_size_align_unchecked(total, block_alignment(alignment));
        dealloc(base, layout);

        self.stats.live_blocks -= 1;
        self.stats.live_bytes -= total;
        if self.trace {
            tracing::trace!(alignment, total, ?ptr, "deallocate");
        }
    }

    /// Move a block to a new size. A null `ptr` behaves like allocate.
    ///
    /// On failure the old block is left untouched.
    ///
    /// # Safety
    /// Same contract as [`deallocate`](Self::deallocate).
    pub unsafe fn try_reallocate(
        &mut self,
        ptr: *mut u8,
        alignment: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>, HostError> {
        if ptr.is_null() {
            return self.try_allocate(new_size, alignment);
        }
        let old_user_bytes = read_total(ptr) - header_bytes(alignment);
        let new_ptr = self.try_allocate(new_size, alignment)?;
        ptr::copy_nonoverlapping(ptr, new_ptr.as_ptr(), old_user_bytes.min(new_size));
        self.deallocate(ptr, alignment);
        Ok(new_ptr)
    }

    /// Reallocate, terminating the process on failure.
    ///
    /// # Safety
    /// Same contract as [`deallocate`](Self::deallocate).
    pub unsafe fn reallocate(
        &mut self,
        ptr: *mut u8,
        alignment: usize,
        new_size: usize,
    ) -> *mut u8 {
        match self.try_reallocate(ptr, alignment, new_size) {
            Ok(ptr) => ptr.as_ptr(),
            Err(err) => fatal::abort_with(&format!("reallocation failed: {}", err)),
        }
    }
}

impl BufferAllocator for TrackedAllocator {
    fn allocate(&mut self, size: usize, alignment: usize) -> *mut u8 {
        TrackedAllocator::allocate(self, size, alignment)
    }

    unsafe fn deallocate(&mut self, ptr: *mut u8, alignment: usize) {
        TrackedAllocator::deallocate(self, ptr, alignment)
    }
}

fn check_alignment(alignment: usize) -> Result<(), HostError> {
    if alignment.is_power_of_two() {
        Ok(())
    } else {
        Err(HostError::InvalidAlignment(alignment))
    }
}

/// The size word must itself be aligned, so blocks are never less than
/// word-aligned.
fn block_alignment(alignment: usize) -> usize {
    alignment.max(align_of::<usize>())
}

fn block_layout(total: usize, alignment: usize) -> Option<Layout> {
    Layout::from_size_align(total, block_alignment(alignment)).ok()
}

unsafe fn write_total(user: *mut u8, total: usize) {
    (user.sub(size_of::<usize>()) as *mut usize).write(total);
}

unsafe fn read_total(user: *const u8) -> usize {
    (user.sub(size_of::<usize>()) as *const usize).read()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIGNMENTS: [usize; 13] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096];

    #[test]
    fn test_header_bytes() {
        let word = size_of::<usize>();
        assert_eq!(header_bytes(1), word);
        assert_eq!(header_bytes(word), word);
        assert_eq!(header_bytes(64), 64);
    }

    #[test]
    fn test_allocate_writes_total_size() {
        let mut alloc = TrackedAllocator::new();
        let ptr = alloc.try_allocate(100, 16).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 16, 0);
        assert_eq!(unsafe { read_total(ptr.as_ptr()) }, 100 + header_bytes(16));
        assert_eq!(alloc.stats().live_bytes, 100 + header_bytes(16));
        unsafe { alloc.deallocate(ptr.as_ptr(), 16) };
        assert!(!alloc.has_leaks());
    }

    #[test]
    fn test_every_alignment_round_trips() {
        let mut alloc = TrackedAllocator::new();
        for &alignment in &ALIGNMENTS {
            for size in [0usize, 1, 7, 31, 32, 33, 1000] {
                let ptr = alloc.try_allocate(size, alignment).unwrap();
                assert_eq!(ptr.as_ptr() as usize % alignment, 0, "align {}", alignment);
                assert_eq!(alloc.stats().live_bytes, size + header_bytes(alignment));
                unsafe {
                    ptr::write_bytes(ptr.as_ptr(), 0xAB, size);
                    alloc.deallocate(ptr.as_ptr(), alignment);
                }
                assert_eq!(alloc.stats().live_bytes, 0);
                assert_eq!(alloc.stats().live_blocks, 0);
            }
        }
    }

    #[test]
    fn test_zero_size_allocation_is_valid() {
        let mut alloc = TrackedAllocator::new();
        let ptr = alloc.try_allocate(0, 1).unwrap();
        assert_eq!(alloc.stats().live_blocks, 1);
        unsafe { alloc.deallocate(ptr.as_ptr(), 1) };
        assert!(!alloc.has_leaks());
    }

    #[test]
    fn test_reallocate_grow_preserves_contents() {
        let mut alloc = TrackedAllocator::new();
        let ptr = alloc.try_allocate(4, 8).unwrap();
        unsafe {
            ptr::copy_nonoverlapping([1u8, 2, 3, 4].as_ptr(), ptr.as_ptr(), 4);
            let grown = alloc.try_reallocate(ptr.as_ptr(), 8, 64).unwrap();
            assert_eq!(core::slice::from_raw_parts(grown.as_ptr(), 4), &[1, 2, 3, 4]);
            assert_eq!(read_total(grown.as_ptr()), 64 + header_bytes(8));
            assert_eq!(alloc.stats().live_blocks, 1);
            alloc.deallocate(grown.as_ptr(), 8);
        }
        assert!(!alloc.has_leaks());
    }

    #[test]
    fn test_reallocate_shrink_truncates() {
        let mut alloc = TrackedAllocator::new();
        for &alignment in &ALIGNMENTS {
            unsafe {
                let ptr = alloc.try_allocate(16, alignment).unwrap();
                for i in 0..16u8 {
                    ptr.as_ptr().add(i as usize).write(i);
                }
                let shrunk = alloc.try_reallocate(ptr.as_ptr(), alignment, 5).unwrap();
                assert_eq!(shrunk.as_ptr() as usize % alignment, 0);
                assert_eq!(core::slice::from_raw_parts(shrunk.as_ptr(), 5), &[0, 1, 2, 3, 4]);
                assert_eq!(alloc.stats().live_bytes, 5 + header_bytes(alignment));
                alloc.deallocate(shrunk.as_ptr(), alignment);
            }
        }
        assert_eq!(alloc.stats().live_bytes, 0);
    }

    #[test]
    fn test_reallocate_null_allocates() {
        let mut alloc = TrackedAllocator::new();
        let ptr = unsafe { alloc.try_reallocate(ptr::null_mut(), 4, 12) }.unwrap();
        assert_eq!(alloc.stats().live_blocks, 1);
        unsafe { alloc.deallocate(ptr.as_ptr(), 4) };
        assert!(!alloc.has_leaks());
    }

    #[test]
    fn test_deallocate_null_is_noop() {
        let mut alloc = TrackedAllocator::new();
        unsafe { alloc.deallocate(ptr::null_mut(), 8) };
        assert_eq!(alloc.stats(), AllocatorStats::default());
    }

    #[test]
    fn test_invalid_alignment_rejected() {
        let mut alloc = TrackedAllocator::new();
        for alignment in [0usize, 3, 12, 100] {
            let err = alloc.try_allocate(8, alignment).unwrap_err();
            assert!(matches!(err, HostError::InvalidAlignment(a) if a == alignment));
        }
        assert_eq!(alloc.stats().total_allocations, 0);
    }

    #[test]
    fn test_size_overflow_rejected() {
        let mut alloc = TrackedAllocator::new();
        let err = alloc.try_allocate(usize::MAX, 8).unwrap_err();
        assert!(matches!(err, HostError::SizeOverflow { .. }));
        let err = alloc.try_allocate(isize::MAX as usize, 8).unwrap_err();
        assert!(matches!(err, HostError::SizeOverflow { .. }));
        assert!(!alloc.has_leaks());
    }

    #[test]
    fn test_leak_accounting_and_peak() {
        let mut alloc = TrackedAllocator::with_tracing(true);
        let a = alloc.try_allocate(10, 8).unwrap();
        let b = alloc.try_allocate(20, 8).unwrap();
        let stats = alloc.stats();
        assert_eq!(stats.live_blocks, 2);
        assert_eq!(stats.live_bytes, 30 + 2 * header_bytes(8));
        assert_eq!(stats.total_allocations, 2);

        unsafe { alloc.deallocate(a.as_ptr(), 8) };
        assert!(alloc.has_leaks());
        unsafe { alloc.deallocate(b.as_ptr(), 8) };
        assert!(!alloc.has_leaks());
        assert_eq!(alloc.stats().peak_bytes, stats.live_bytes);
    }

    #[test]
    fn test_buffer_allocator_trait() {
        let mut alloc = TrackedAllocator::new();
        let list = sigil_hostapi::RocList::from_slice_in(&mut alloc, b"sigil");
        assert_eq!(alloc.stats().live_blocks, 1);
        unsafe { list.release_in(&mut alloc) };
        assert!(!alloc.has_leaks());
    }
}
