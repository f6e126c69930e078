//! The runtime's length-prefixed, reference-counted buffer layout.
//!
//! A `RocList<T>` is `(elements, length, capacity)`. Heap lists carry a
//! `usize` reference count immediately before `elements`; the whole block is
//! allocated and released through a [`BufferAllocator`]. The empty list is
//! `(null, 0, 0)` and owns nothing.
//!
//! ```text
//! base                        elements
//! |  padding  | refcount: usize | items ...
//! ```
//!
//! `RocStr` shares the layout with `RocList<u8>`, plus an inline form for
//! short strings: the bytes sit in the struct itself and its last byte is
//! `0x80 | len`. Heap capacities never have that bit set, so the flag alone
//! tells the two apart.
//!
//! ```text
//! inline:  | bytes ... | 0 padding | 0x80 | len |
//! ```

use core::mem::{align_of, size_of};
use core::ptr;

use crate::traits::BufferAllocator;

/// Reference count of a freshly allocated buffer.
pub const REFCOUNT_ONE: usize = 1;

/// A runtime list. See the module docs for the layout.
#[repr(C)]
#[derive(Debug)]
pub struct RocList<T> {
    elements: *mut T,
    length: usize,
    capacity: usize,
}

impl<T> RocList<T> {
    /// The empty list. Used as the failure sentinel by the crypto bridge.
    pub const fn empty() -> Self {
        Self {
            elements: ptr::null_mut(),
            length: 0,
            capacity: 0,
        }
    }

    /// Alignment requested from the allocator for a list of `T`.
    pub const fn alloc_alignment() -> usize {
        let t = align_of::<T>();
        let word = align_of::<usize>();
        if t > word {
            t
        } else {
            word
        }
    }

    /// Offset from the allocation base to the first element.
    pub const fn data_offset() -> usize {
        let t = align_of::<T>();
        let word = size_of::<usize>();
        if t > word {
            t
        } else {
            word
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raw element pointer (null for the empty list).
    pub fn as_ptr(&self) -> *const T {
        self.elements
    }

    /// Move `items` into a freshly allocated list.
    pub fn from_vec_in<A: BufferAllocator + ?Sized>(alloc: &mut A, items: Vec<T>) -> Self {
        if items.is_empty() {
            return Self::empty();
        }
        let len = items.len();
        let elements = Self::allocate_block(alloc, len);
        let mut items = items;
        // SAFETY: `elements` has room for `len` items and does not overlap
        // `items`. Zeroing the length hands ownership of the items to the list.
        unsafe {
            ptr::copy_nonoverlapping(items.as_ptr(), elements, len);
            items.set_len(0);
        }
        Self {
            elements,
            length: len,
            capacity: len,
        }
    }

    /// Allocate a block for `len` items and write the initial refcount.
    fn allocate_block<A: BufferAllocator + ?Sized>(alloc: &mut A, len: usize) -> *mut T {
        let offset = Self::data_offset();
        let size = len
            .checked_mul(size_of::<T>())
            .and_then(|bytes| bytes.checked_add(offset))
            .unwrap_or(usize::MAX);
        let base = alloc.allocate(size, Self::alloc_alignment());
        // SAFETY: the allocator returned at least `size` bytes at `base`, and
        // `offset >= size_of::<usize>()` keeps the refcount inside the block.
        unsafe {
            let elements = base.add(offset);
            let refcount = elements.sub(size_of::<usize>()) as *mut usize;
            refcount.write(REFCOUNT_ONE);
            elements as *mut T
        }
    }

    /// Borrow the elements.
    ///
    /// # Safety
    /// `elements` must be null or point to `length` initialised items that
    /// stay alive for the returned borrow. Lists built by the host satisfy
    /// this; lists received from the runtime satisfy it if the runtime does.
    pub unsafe fn as_slice(&self) -> &[T] {
        if self.elements.is_null() || self.length == 0 {
            return &[];
        }
        core::slice::from_raw_parts(self.elements, self.length)
    }

    /// Base pointer of the backing allocation, or null for the empty list.
    pub fn allocation_ptr(&self) -> *mut u8 {
        if self.elements.is_null() {
            return ptr::null_mut();
        }
        // SAFETY: heap lists always start `data_offset()` bytes into their block.
        unsafe { (self.elements as *mut u8).sub(Self::data_offset()) }
    }

    /// Current reference count, or `None` for the empty list.
    ///
    /// # Safety
    /// The list must be empty or heap-allocated with the layout above.
    pub unsafe fn refcount(&self) -> Option<usize> {
        if self.elements.is_null() {
            return None;
        }
        let slot = (self.elements as *mut u8).sub(size_of::<usize>()) as *const usize;
        Some(slot.read())
    }

    /// Drop one reference, freeing the block when it reaches zero.
    ///
    /// This is what the runtime does when it is done with a list the host
    /// returned; the host itself never calls it on runtime-owned buffers.
    /// Items are not dropped: release nested buffers first.
    ///
    /// # Safety
    /// The list must have been allocated by `alloc` with the layout above and
    /// must not be used afterwards.
    pub unsafe fn release_in<A: BufferAllocator + ?Sized>(self, alloc: &mut A) {
        if self.elements.is_null() {
            return;
        }
        let slot = (self.elements as *mut u8).sub(size_of::<usize>()) as *mut usize;
        let count = slot.read();
        if count > 1 {
            slot.write(count - 1);
            return;
        }
        alloc.deallocate(self.allocation_ptr(), Self::alloc_alignment());
    }
}

impl<T: Copy> RocList<T> {
    /// Copy `items` into a freshly allocated list.
    pub fn from_slice_in<A: BufferAllocator + ?Sized>(alloc: &mut A, items: &[T]) -> Self {
        if items.is_empty() {
            return Self::empty();
        }
        let elements = Self::allocate_block(alloc, items.len());
        // SAFETY: fresh block with room for `items.len()` elements.
        unsafe { ptr::copy_nonoverlapping(items.as_ptr(), elements, items.len()) };
        Self {
            elements,
            length: items.len(),
            capacity: items.len(),
        }
    }
}

impl<T> Default for RocList<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Size of a `RocStr`.
const STR_SIZE: usize = size_of::<RocList<u8>>();

/// Longest string the runtime stores inline.
pub const SMALL_STR_MAX_LEN: usize = STR_SIZE - 1;

/// Set in the last byte of an inline string.
const SMALL_STR_FLAG: u8 = 0x80;

/// A runtime string: UTF-8 bytes in `RocList<u8>` layout, or inline.
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct RocStr(RocList<u8>);

impl RocStr {
    pub const fn empty() -> Self {
        Self(RocList::empty())
    }

    /// Copy `text` into a freshly allocated heap string.
    pub fn from_str_in<A: BufferAllocator + ?Sized>(alloc: &mut A, text: &str) -> Self {
        Self(RocList::from_slice_in(alloc, text.as_bytes()))
    }

    /// Store `text` inline, or `None` if it is longer than
    /// [`SMALL_STR_MAX_LEN`].
    pub fn inline(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        if bytes.len() > SMALL_STR_MAX_LEN {
            return None;
        }
        let mut raw = [0u8; STR_SIZE];
        raw[..bytes.len()].copy_from_slice(bytes);
        raw[STR_SIZE - 1] = SMALL_STR_FLAG | bytes.len() as u8;

        const WORD: usize = size_of::<usize>();
        let word = |index: usize| {
            let mut bytes = [0u8; WORD];
            bytes.copy_from_slice(&raw[index * WORD..(index + 1) * WORD]);
            usize::from_ne_bytes(bytes)
        };
        Some(Self(RocList {
            elements: word(0) as *mut u8,
            length: word(1),
            capacity: word(2),
        }))
    }

    /// Inline when `text` fits, heap-allocated otherwise.
    pub fn new_in<A: BufferAllocator + ?Sized>(alloc: &mut A, text: &str) -> Self {
        match Self::inline(text) {
            Some(small) => small,
            None => Self::from_str_in(alloc, text),
        }
    }

    /// The last byte of the struct, read from the capacity word.
    fn tag(&self) -> u8 {
        self.0.capacity.to_ne_bytes()[size_of::<usize>() - 1]
    }

    pub fn is_inline(&self) -> bool {
        self.tag() & SMALL_STR_FLAG != 0
    }

    pub fn len(&self) -> usize {
        if self.is_inline() {
            (self.tag() & !SMALL_STR_FLAG) as usize
        } else {
            self.0.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The heap list behind this string, `None` for inline strings.
    pub fn as_list(&self) -> Option<&RocList<u8>> {
        if self.is_inline() {
            None
        } else {
            Some(&self.0)
        }
    }

    /// Borrow the bytes.
    ///
    /// # Safety
    /// Same contract as [`RocList::as_slice`] for heap strings. Inline
    /// strings are always readable.
    pub unsafe fn as_bytes(&self) -> &[u8] {
        if self.is_inline() {
            core::slice::from_raw_parts(self as *const Self as *const u8, self.len())
        } else {
            self.0.as_slice()
        }
    }

    /// Decode the string, replacing invalid UTF-8.
    ///
    /// # Safety
    /// Same contract as [`as_bytes`](Self::as_bytes).
    pub unsafe fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Release a heap string. Inline strings own nothing.
    ///
    /// # Safety
    /// Same contract as [`RocList::release_in`].
    pub unsafe fn release_in<A: BufferAllocator + ?Sized>(self, alloc: &mut A) {
        if self.is_inline() {
            return;
        }
        self.0.release_in(alloc)
    }
}
