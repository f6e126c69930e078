//! Process-terminating failure paths.
//!
//! Out-of-memory, curve-context failure and runtime crashes are not
//! recoverable in a short-lived host process: write the diagnostic and exit
//! with status 1.

use std::io::Write;

/// Exit status for every fatal condition.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Write `message` to stderr and terminate the process.
pub fn abort_with(message: &str) -> ! {
    tracing::error!(%message, "fatal host error");
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", message);
    let _ = stderr.flush();
    std::process::exit(FATAL_EXIT_CODE)
}
