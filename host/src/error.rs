//! Host crate error types.

use sigil_hostapi::HostError;

/// Failure to start a managed program run.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    /// The host environment could not be created.
    #[error("host setup failed: {0}")]
    Setup(#[from] HostError),
}
