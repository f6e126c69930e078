//! Hosted function table and the raw calling-convention boundary.
//!
//! Every hosted function has the signature `(ops, ret, args)` with all three
//! pointers untyped. This module is the only place those pointers are cast:
//! each entry reads its `#[repr(C)]` argument struct, calls the typed
//! [`HostApi`] method on the environment, builds any result buffer through
//! the tracked allocator and writes the result through `ret`.
//!
//! The table is built from `HostedFn`, so an entry's index is its variant's
//! discriminant by construction.
//!
//! Argument buffers are borrowed from the runtime and never released here.
//! Result buffers are handed to the runtime, which releases them through the
//! `dealloc` callback.

use std::ffi::c_void;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;

use sigil_hostapi::hosted::{
    HashArgs, LineArgs, PublicKeyArgs, SignArgs, StdinLineResult, VerifyArgs,
};
use sigil_hostapi::{HostApi, HostedFn, HostedFnPtr, HostedFunctions, OpsTable, RocList, RocStr};

use crate::env::HostEnv;
use crate::fatal;
use crate::ops::env_from;

/// The hosted function table, indexed by `HostedFn` ordinal.
pub static HOSTED_TABLE: [HostedFnPtr; HostedFn::COUNT] = build_table();

/// Count + pointer view of [`HOSTED_TABLE`] for the `OpsTable`.
pub fn hosted_functions() -> HostedFunctions {
    HostedFunctions::from_table(&HOSTED_TABLE)
}

/// The native entry for one hosted function.
pub const fn entry_for(function: HostedFn) -> HostedFnPtr {
    match function {
        HostedFn::SchnorrPublicKey => schnorr_public_key,
        HostedFn::SchnorrSign => schnorr_sign,
        HostedFn::SchnorrVerify => schnorr_verify,
        HostedFn::Sha256HashBinary => sha256_hash_binary,
        HostedFn::Sha256HashHex => sha256_hash_hex,
        HostedFn::StderrLine => stderr_line,
        HostedFn::StdinLine => stdin_line,
        HostedFn::StdoutLine => stdout_line,
    }
}

const fn build_table() -> [HostedFnPtr; HostedFn::COUNT] {
    let mut table = [schnorr_public_key as HostedFnPtr; HostedFn::COUNT];
    let mut i = 0;
    while i < HostedFn::COUNT {
        table[i] = entry_for(HostedFn::ALL[i]);
        i += 1;
    }
    table
}

/// Run a hosted function body with the environment and typed arguments.
///
/// A panic must not unwind into the runtime; it ends the process like a
/// crash.
unsafe fn hosted<A, F>(function: HostedFn, ops: *const OpsTable, args: *mut c_void, body: F)
where
    F: FnOnce(&mut HostEnv, &A),
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let env = env_from((*ops).env);
        // Zero-sized argument records may arrive as a null pointer.
        let args: &A = if mem::size_of::<A>() == 0 {
            NonNull::<A>::dangling().as_ref()
        } else {
            &*(args as *const A)
        };
        tracing::trace!(function = function.qualified_name(), "hosted call");
        body(env, args)
    }));
    if result.is_err() {
        fatal::abort_with(&format!("hosted function {} panicked", function.qualified_name()));
    }
}

/// Copy `bytes` into a fresh runtime list, or the empty sentinel for `None`.
fn list_or_empty(env: &mut HostEnv, bytes: Option<&[u8]>) -> RocList<u8> {
    match bytes {
        Some(bytes) => RocList::from_slice_in(&mut env.allocator, bytes),
        None => RocList::empty(),
    }
}

// ── Schnorr ──

unsafe extern "C" fn schnorr_public_key(ops: *const OpsTable, ret: *mut c_void, args: *mut c_void) {
    hosted(HostedFn::SchnorrPublicKey, ops, args, |env, args: &PublicKeyArgs| {
        let public_key = env.schnorr_public_key(args.secret_key.as_slice());
        let list = list_or_empty(env, public_key.as_ref().map(|k| &k[..]));
        (ret as *mut RocList<u8>).write(list);
    });
}

unsafe extern "C" fn schnorr_sign(ops: *const OpsTable, ret: *mut c_void, args: *mut c_void) {
    hosted(HostedFn::SchnorrSign, ops, args, |env, args: &SignArgs| {
        let signature = env.schnorr_sign(args.secret_key.as_slice(), args.digest.as_slice());
        let list = list_or_empty(env, signature.as_ref().map(|s| &s[..]));
        (ret as *mut RocList<u8>).write(list);
    });
}

unsafe extern "C" fn schnorr_verify(ops: *const OpsTable, ret: *mut c_void, args: *mut c_void) {
    hosted(HostedFn::SchnorrVerify, ops, args, |env, args: &VerifyArgs| {
        let valid = env.schnorr_verify(
            args.public_key.as_slice(),
            args.digest.as_slice(),
            args.signature.as_slice(),
        );
        (ret as *mut bool).write(valid);
    });
}

// ── SHA-256 ──

unsafe extern "C" fn sha256_hash_binary(ops: *const OpsTable, ret: *mut c_void, args: *mut c_void) {
    hosted(HostedFn::Sha256HashBinary, ops, args, |env, args: &HashArgs| {
        let digest = env.sha256(args.message.as_slice());
        let list = RocList::from_slice_in(&mut env.allocator, &digest);
        (ret as *mut RocList<u8>).write(list);
    });
}

unsafe extern "C" fn sha256_hash_hex(ops: *const OpsTable, ret: *mut c_void, args: *mut c_void) {
    hosted(HostedFn::Sha256HashHex, ops, args, |env, args: &HashArgs| {
        let hex = env.sha256_hex(args.message.as_slice());
        let text = RocStr::from_str_in(&mut env.allocator, &hex);
        (ret as *mut RocStr).write(text);
    });
}

// ── Terminal I/O ──

unsafe extern "C" fn stderr_line(ops: *const OpsTable, _ret: *mut c_void, args: *mut c_void) {
    hosted(HostedFn::StderrLine, ops, args, |env, args: &LineArgs| {
        let line = args.line.to_string_lossy();
        if let Err(err) = env.stderr_line(&line) {
            tracing::warn!(error = %err, "Stderr.line! failed");
        }
    });
}

unsafe extern "C" fn stdin_line(ops: *const OpsTable, ret: *mut c_void, args: *mut c_void) {
    hosted(HostedFn::StdinLine, ops, args, |env, _: &()| {
        let line = env.stdin_line().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Stdin.line! failed, treating as end of input");
            None
        });
        let result = match line {
            Some(line) => StdinLineResult {
                line: RocStr::new_in(&mut env.allocator, &line),
                end_of_file: false,
            },
            None => StdinLineResult {
                line: RocStr::empty(),
                end_of_file: true,
            },
        };
        (ret as *mut StdinLineResult).write(result);
    });
}

unsafe extern "C" fn stdout_line(ops: *const OpsTable, _ret: *mut c_void, args: *mut c_void) {
    hosted(HostedFn::StdoutLine, ops, args, |env, args: &LineArgs| {
        let line = args.line.to_string_lossy();
        if let Err(err) = env.stdout_line(&line) {
            tracing::warn!(error = %err, "Stdout.line! failed");
        }
    });
}
