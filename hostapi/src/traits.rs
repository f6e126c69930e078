//! Host traits: typed seams between the raw ABI and host logic.
//!
//! `HostApi` is what the hosted function table dispatches to once the raw
//! argument structs have been unpacked. It works with Rust slices and
//! arrays, never with raw pointers or runtime buffers; the dispatch layer
//! owns every cast and every allocation.
//!
//! `BufferAllocator` is the memory interface runtime buffers are built on.

use crate::error::HostError;
use crate::types::{DIGEST_LEN, PUBLIC_KEY_LEN, SIGNATURE_LEN};

/// Allocator interface used to build and release runtime buffers.
pub trait BufferAllocator {
    /// Allocate `size` bytes at `alignment`.
    ///
    /// Never returns null: implementations terminate the process (or panic,
    /// in tests) when memory cannot be provided.
    fn allocate(&mut self, size: usize, alignment: usize) -> *mut u8;

    /// Release a block returned by [`allocate`](BufferAllocator::allocate).
    ///
    /// # Safety
    /// `ptr` must come from this allocator with the same `alignment` and must
    /// not have been released already.
    unsafe fn deallocate(&mut self, ptr: *mut u8, alignment: usize);
}

/// Host-side implementation of the hosted functions.
///
/// Crypto methods return `None` / `false` for every failure, including wrong
/// input lengths and invalid keys. The dispatch layer turns `None` into the
/// empty-buffer sentinel.
pub trait HostApi {
    // ── Schnorr (BIP-340 over secp256k1) ──

    /// Derive the x-only public key for a 32-byte secret key.
    fn schnorr_public_key(&self, secret_key: &[u8]) -> Option<[u8; PUBLIC_KEY_LEN]>;

    /// Sign a 32-byte digest with a 32-byte secret key.
    fn schnorr_sign(&self, secret_key: &[u8], digest: &[u8]) -> Option<[u8; SIGNATURE_LEN]>;

    /// Verify a 64-byte signature over a 32-byte digest.
    ///
    /// Malformed keys and signatures verify as `false`.
    fn schnorr_verify(&self, public_key: &[u8], digest: &[u8], signature: &[u8]) -> bool;

    // ── SHA-256 ──

    /// SHA-256 of an arbitrary message.
    fn sha256(&self, message: &[u8]) -> [u8; DIGEST_LEN];

    /// SHA-256 of an arbitrary message as 64 lowercase hex characters.
    fn sha256_hex(&self, message: &[u8]) -> String;

    // ── Terminal I/O ──

    /// Read one line from stdin without its line terminator.
    ///
    /// Returns `Ok(None)` at end of input.
    fn stdin_line(&mut self) -> Result<Option<String>, HostError>;

    /// Write `line` plus a newline to stdout.
    fn stdout_line(&mut self, line: &str) -> Result<(), HostError>;

    /// Write `line` plus a newline to stderr.
    fn stderr_line(&mut self, line: &str) -> Result<(), HostError>;
}
