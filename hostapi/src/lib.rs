//! `sigil-hostapi`: ABI layouts and shared types for the Sigil native host.
//!
//! This crate defines everything both sides of the host boundary must agree
//! on byte-for-byte. It provides:
//!
//! - `OpsTable`: the callback table handed to the managed runtime at startup
//! - `RocList` / `RocStr`: the runtime's length-prefixed buffer layout
//! - `HostedFn`: the single enumeration that fixes hosted function ordinals
//! - `HostApi` / `BufferAllocator` traits: typed seams for the host crate
//! - `HostConfig`: logging and curve-capability configuration
//! - `HostError`: host-side error type for fatal paths
//!
//! Nothing in here performs I/O or cryptography; the `sigil-host` crate
//! implements the traits.

pub mod abi;
pub mod buffer;
pub mod error;
pub mod hosted;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root.
pub use abi::{EntryFn, HostedFnPtr, HostedFunctions, OpsTable};
pub use buffer::{RocList, RocStr};
pub use error::HostError;
pub use hosted::HostedFn;
pub use traits::{BufferAllocator, HostApi};
pub use types::{Capabilities, HostConfig};
