//! `sigil-host`: native host for managed programs that sign and verify
//! BIP-340 Schnorr signatures.
//!
//! This crate implements the host side of the runtime boundary:
//!
//! - **Tracked allocator:** size-header allocation behind the runtime's
//!   alloc/dealloc/realloc callbacks, with leak accounting
//! - **Operation table:** memory and diagnostic callbacks handed to the
//!   runtime once per run
//! - **Hosted functions:** the ordinal dispatch table for Schnorr, SHA-256
//!   and line I/O
//! - **Entrypoint:** argv marshaling, the managed call, and exit-code policy
//!
//! The primary entry point is [`entry::run`].

pub mod allocator;
pub mod crypto;
pub mod dispatch;
pub mod entry;
pub mod env;
pub mod error;
pub mod fatal;
pub mod logging;
pub mod ops;

pub use allocator::{AllocatorStats, TrackedAllocator};
pub use entry::{run, RunOutcome};
pub use env::{HostEnv, HostIo};
pub use error::EntryError;
