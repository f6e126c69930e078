//! Process entrypoint: argv marshaling, the managed call and shutdown checks.
//!
//! One run:
//! 1. Create the `HostEnv` (curve context included)
//! 2. Copy argv into tracked runtime strings and a tracked list
//! 3. Build the `OpsTable` and call the managed entry function
//! 4. Reclaim the environment, then turn leaks and debug statements into a
//!    failing exit code
//!
//! The argument list is owned by the managed program once the entry function
//! is called; it is released through the `dealloc` callback like any other
//! runtime buffer.

use std::ffi::{c_void, OsStr};

use sigil_hostapi::{EntryFn, HostConfig, RocList, RocStr};

use crate::allocator::{AllocatorStats, TrackedAllocator};
use crate::env::{HostEnv, HostIo};
use crate::error::EntryError;
use crate::ops::ops_table;

/// Exit status forced by a leak or a debug statement.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Result of one managed program run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Status the process should exit with.
    pub exit_code: i32,
    /// Status the managed program reported.
    pub program_code: i32,
    /// Allocator state after the program returned.
    pub allocator: AllocatorStats,
    /// Whether `dbg` or `expect_failed` fired.
    pub debug_called: bool,
}

impl RunOutcome {
    pub fn leaked(&self) -> bool {
        self.allocator.has_leaks()
    }
}

/// Copy argv into a runtime `List Str`. Non-UTF-8 arguments are decoded
/// lossily.
pub fn build_args<I, S>(allocator: &mut TrackedAllocator, argv: I) -> RocList<RocStr>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let strings: Vec<RocStr> = argv
        .into_iter()
        .map(|arg| RocStr::from_str_in(allocator, &arg.as_ref().to_string_lossy()))
        .collect();
    RocList::from_vec_in(allocator, strings)
}

/// Run a managed program to completion.
///
/// Returns `Err` only if the environment cannot be created; the binary
/// treats that as fatal.
pub fn run<I, S>(
    entry: EntryFn,
    argv: I,
    io: HostIo,
    config: &HostConfig,
) -> Result<RunOutcome, EntryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let env = Box::into_raw(Box::new(HostEnv::new(config, io)?));

    // SAFETY: `env` is a fresh, exclusively owned allocation. Until it is
    // reclaimed below it is only reached through this pointer and the ops
    // table, and the managed call is the only user of the table.
    let (mut env, program_code) = unsafe {
        let mut args = build_args(&mut (*env).allocator, argv);
        tracing::debug!(argc = args.len(), "calling managed entry");

        let ops = ops_table(env);
        let mut program_code: i32 = 0;
        entry(
            &ops,
            &mut program_code as *mut i32 as *mut c_void,
            &mut args as *mut RocList<RocStr> as *mut c_void,
        );
        tracing::debug!(program_code, "managed entry returned");

        (Box::from_raw(env), program_code)
    };

    let allocator = env.allocator.stats();
    let debug_called = env.debug_called();
    let exit_code = if allocator.has_leaks() {
        tracing::error!(
            live_blocks = allocator.live_blocks,
            live_bytes = allocator.live_bytes,
            "memory leak detected"
        );
        env.diagnostic(&format!(
            "memory leak detected: {} allocation(s), {} byte(s) still live",
            allocator.live_blocks, allocator.live_bytes
        ));
        FAILURE_EXIT_CODE
    } else if debug_called && program_code == 0 {
        env.diagnostic("dbg or expect statements ran; exiting with failure");
        FAILURE_EXIT_CODE
    } else {
        program_code
    };

    let report = env.shutdown();
    Ok(RunOutcome {
        exit_code,
        program_code,
        allocator: report.allocator,
        debug_called: report.debug_called,
    })
}
