//! Operation table callbacks.
//!
//! The runtime receives one `OpsTable` and calls back through it for memory
//! and diagnostics. Each callback gets its request struct plus the opaque
//! `env` pointer and turns the latter back into `&mut HostEnv`.

use std::ffi::c_void;

use sigil_hostapi::abi::{AllocRequest, DeallocRequest, ReallocRequest, Utf8Message};
use sigil_hostapi::OpsTable;

use crate::dispatch;
use crate::env::HostEnv;
use crate::fatal;

/// Build the table for `env`.
///
/// `env` must stay at the same address, and no other reference to it may be
/// used, for as long as the runtime can call back through the table.
pub fn ops_table(env: *mut HostEnv) -> OpsTable {
    OpsTable {
        env: env as *mut c_void,
        alloc: host_alloc,
        dealloc: host_dealloc,
        realloc: host_realloc,
        dbg: host_dbg,
        expect_failed: host_expect_failed,
        crashed: host_crashed,
        hosted_fns: dispatch::hosted_functions(),
    }
}

/// Recover the environment from the opaque pointer.
///
/// # Safety
/// `env` must be the pointer stored by [`ops_table`] and the environment
/// must still be alive.
pub(crate) unsafe fn env_from<'a>(env: *mut c_void) -> &'a mut HostEnv {
    &mut *(env as *mut HostEnv)
}

unsafe extern "C" fn host_alloc(request: *mut AllocRequest, env: *mut c_void) {
    let env = env_from(env);
    let request = &mut *request;
    request.answer = env.allocator.allocate(request.length, request.alignment) as *mut c_void;
}

unsafe extern "C" fn host_dealloc(request: *mut DeallocRequest, env: *mut c_void) {
    let env = env_from(env);
    let request = &*request;
    env.allocator.deallocate(request.ptr as *mut u8, request.alignment);
}

unsafe extern "C" fn host_realloc(request: *mut ReallocRequest, env: *mut c_void) {
    let env = env_from(env);
    let request = &mut *request;
    request.answer = env
        .allocator
        .reallocate(request.answer as *mut u8, request.alignment, request.new_length)
        as *mut c_void;
}

unsafe extern "C" fn host_dbg(message: *const Utf8Message, env: *mut c_void) {
    let env = env_from(env);
    let text = (*message).to_string_lossy();
    tracing::debug!(message = %text, "dbg");
    env.diagnostic(&format!("[dbg] {}", text));
    env.mark_debug_called();
}

unsafe extern "C" fn host_expect_failed(message: *const Utf8Message, env: *mut c_void) {
    let env = env_from(env);
    let text = (*message).to_string_lossy();
    tracing::warn!(message = %text, "expect failed");
    env.diagnostic(&format!("[expect failed] {}", text));
    env.mark_debug_called();
}

unsafe extern "C" fn host_crashed(message: *const Utf8Message, env: *mut c_void) {
    let env = env_from(env);
    let text = (*message).to_string_lossy();
    env.diagnostic(&format!("Program crashed: {}", text));
    tracing::error!(message = %text, "managed program crashed");
    std::process::exit(fatal::FATAL_EXIT_CODE)
}
