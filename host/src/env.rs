//! The host environment threaded through every callback.
//!
//! `HostEnv` owns the tracked allocator, the curve context, the terminal
//! streams and the sticky debug flag. The entrypoint creates exactly one per
//! run, hands the runtime an opaque pointer to it inside the `OpsTable`, and
//! reclaims it after the managed entry function returns.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use sigil_hostapi::types::{DIGEST_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN};
use sigil_hostapi::{HostApi, HostConfig, HostError};

use crate::allocator::{AllocatorStats, TrackedAllocator};
use crate::crypto::{self, CurveContext};

/// Terminal streams used by the line I/O functions and diagnostics.
pub struct HostIo {
    pub stdin: Box<dyn BufRead>,
    pub stdout: Box<dyn Write>,
    pub stderr: Box<dyn Write>,
}

impl HostIo {
    /// The process's own stdin (buffered), stdout and stderr.
    pub fn std() -> Self {
        Self {
            stdin: Box::new(BufReader::new(io::stdin())),
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }
}

/// What is left of the environment after the managed program returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub allocator: AllocatorStats,
    pub debug_called: bool,
}

/// Per-run host state. See the module docs.
pub struct HostEnv {
    /// Backing allocator for every runtime allocation.
    pub allocator: TrackedAllocator,
    curve: CurveContext,
    io: HostIo,
    /// Set by `dbg` and `expect_failed`, read once at shutdown.
    debug_called: AtomicBool,
}

impl HostEnv {
    /// Create the environment, including the curve context.
    pub fn new(config: &HostConfig, io: HostIo) -> Result<Self, HostError> {
        let curve = CurveContext::new(config.capabilities)?;
        Ok(Self {
            allocator: TrackedAllocator::with_tracing(config.trace_allocations),
            curve,
            io,
            debug_called: AtomicBool::new(false),
        })
    }

    pub fn mark_debug_called(&self) {
        self.debug_called.store(true, Ordering::Release);
    }

    pub fn debug_called(&self) -> bool {
        self.debug_called.load(Ordering::Acquire)
    }

    /// Write a host diagnostic line to the environment's stderr.
    ///
    /// Diagnostics are best-effort; a failing stderr is only logged.
    pub fn diagnostic(&mut self, text: &str) {
        if let Err(err) = write_line(&mut self.io.stderr, text) {
            tracing::warn!(error = %err, "failed to write diagnostic");
        }
    }

    /// Drop the curve context and report the final allocator state.
    pub fn shutdown(self) -> ShutdownReport {
        let Self {
            allocator,
            curve,
            mut io,
            debug_called,
        } = self;
        drop(curve);
        let _ = io.stdout.flush();
        let _ = io.stderr.flush();
        ShutdownReport {
            allocator: allocator.stats(),
            debug_called: debug_called.into_inner(),
        }
    }
}

impl HostApi for HostEnv {
    fn schnorr_public_key(&self, secret_key: &[u8]) -> Option<[u8; PUBLIC_KEY_LEN]> {
        self.curve.public_key(secret_key)
    }

    fn schnorr_sign(&self, secret_key: &[u8], digest: &[u8]) -> Option<[u8; SIGNATURE_LEN]> {
        self.curve.sign(secret_key, digest)
    }

    fn schnorr_verify(&self, public_key: &[u8], digest: &[u8], signature: &[u8]) -> bool {
        self.curve.verify(public_key, digest, signature)
    }

    fn sha256(&self, message: &[u8]) -> [u8; DIGEST_LEN] {
        crypto::sha256(message)
    }

    fn sha256_hex(&self, message: &[u8]) -> String {
        crypto::sha256_hex(message)
    }

    fn stdin_line(&mut self) -> Result<Option<String>, HostError> {
        let mut buf = Vec::new();
        if self.io.stdin.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    fn stdout_line(&mut self, line: &str) -> Result<(), HostError> {
        write_line(&mut self.io.stdout, line)?;
        Ok(())
    }

    fn stderr_line(&mut self, line: &str) -> Result<(), HostError> {
        write_line(&mut self.io.stderr, line)?;
        Ok(())
    }
}

fn write_line(out: &mut dyn Write, line: &str) -> io::Result<()> {
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}
