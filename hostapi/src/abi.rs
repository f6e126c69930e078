//! C ABI layouts shared with the managed runtime.
//!
//! The runtime receives one `OpsTable` at startup and calls back through it
//! for every allocation and diagnostic. Every callback takes a pointer to a
//! request struct plus the opaque `env` pointer stored in the table.
//!
//! Field order in every `#[repr(C)]` struct here is part of the ABI.

use core::ffi::c_void;

/// `alloc` callback request. The host writes the new pointer to `answer`.
#[repr(C)]
#[derive(Debug)]
pub struct AllocRequest {
    pub alignment: usize,
    pub length: usize,
    pub answer: *mut c_void,
}

/// `dealloc` callback request.
#[repr(C)]
#[derive(Debug)]
pub struct DeallocRequest {
    pub alignment: usize,
    pub ptr: *mut c_void,
}

/// `realloc` callback request.
///
/// `answer` holds the old pointer on entry and the new pointer on return.
#[repr(C)]
#[derive(Debug)]
pub struct ReallocRequest {
    pub alignment: usize,
    pub new_length: usize,
    pub answer: *mut c_void,
}

/// UTF-8 text passed to the `dbg`, `expect_failed` and `crashed` callbacks.
#[repr(C)]
#[derive(Debug)]
pub struct Utf8Message {
    pub bytes: *const u8,
    pub len: usize,
}

impl Utf8Message {
    /// Decode the message, replacing invalid UTF-8.
    ///
    /// # Safety
    /// `bytes` must be null or point to `len` readable bytes.
    pub unsafe fn to_string_lossy(&self) -> String {
        if self.bytes.is_null() || self.len == 0 {
            return String::new();
        }
        let bytes = core::slice::from_raw_parts(self.bytes, self.len);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

pub type AllocFn = unsafe extern "C" fn(*mut AllocRequest, *mut c_void);
pub type DeallocFn = unsafe extern "C" fn(*mut DeallocRequest, *mut c_void);
pub type ReallocFn = unsafe extern "C" fn(*mut ReallocRequest, *mut c_void);
pub type MessageFn = unsafe extern "C" fn(*const Utf8Message, *mut c_void);

/// Hosted function calling convention: `(ops, return slot, packed args)`.
pub type HostedFnPtr = unsafe extern "C" fn(*const OpsTable, *mut c_void, *mut c_void);

/// Managed program entry point. Same convention as a hosted function; the
/// return slot receives an `i32` exit code and `args` is a `RocList<RocStr>`.
pub type EntryFn = unsafe extern "C" fn(*const OpsTable, *mut c_void, *mut c_void);

/// Count + pointer view of the hosted function table.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostedFunctions {
    pub count: u32,
    pub fns: *const HostedFnPtr,
}

impl HostedFunctions {
    /// View a static table.
    pub fn from_table(table: &'static [HostedFnPtr]) -> Self {
        Self {
            count: table.len() as u32,
            fns: table.as_ptr(),
        }
    }

    /// Look up an entry by ordinal.
    ///
    /// # Safety
    /// `fns` must point to `count` valid entries.
    pub unsafe fn get(&self, ordinal: u32) -> Option<HostedFnPtr> {
        if ordinal >= self.count || self.fns.is_null() {
            return None;
        }
        Some(*self.fns.add(ordinal as usize))
    }
}

/// The operation table handed to the managed entry point.
#[repr(C)]
pub struct OpsTable {
    /// Opaque host environment; every callback receives it back.
    pub env: *mut c_void,
    pub alloc: AllocFn,
    pub dealloc: DeallocFn,
    pub realloc: ReallocFn,
    pub dbg: MessageFn,
    pub expect_failed: MessageFn,
    /// Never returns.
    pub crashed: MessageFn,
    pub hosted_fns: HostedFunctions,
}
